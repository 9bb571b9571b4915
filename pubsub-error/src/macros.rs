/// Возвращает `Err` из текущей функции, приводя ошибку к
/// [`StackError`](crate::StackError).
///
/// ```ignore
/// bail!(BoundaryError::NullPointer { what: "topic" });
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
}

/// `bail!(err)`, если условие ложно. Ошибка строится только в этом случае.
///
/// ```ignore
/// ensure!(!topic.is_empty(), PubSubError::EmptyTopic);
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{PubSubError, PubSubResult, StatusCode};

    fn check(
        len: usize,
        limit: usize,
    ) -> PubSubResult<usize> {
        ensure!(
            limit == 0 || len <= limit,
            PubSubError::MessageTooLarge { size: len, limit }
        );
        Ok(len)
    }

    #[test]
    fn test_ensure() {
        assert_eq!(check(4, 4).unwrap(), 4);
        assert_eq!(check(100, 0).unwrap(), 100);
        assert_eq!(check(5, 4).unwrap_err().status_code(), StatusCode::MessageTooLarge);
    }

    #[test]
    fn test_bail() {
        fn always() -> PubSubResult<()> {
            bail!(PubSubError::EmptySubscriber);
        }
        assert_eq!(always().unwrap_err().to_string(), "subscriber id must not be empty");
    }
}
