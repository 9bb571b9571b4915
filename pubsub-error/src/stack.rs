use std::{any::Any, error::Error, fmt, panic::Location};

use crate::{LogLevel, StatusCode};

/// Ошибка, которая знает свой [`StatusCode`].
pub trait ErrorExt: Error + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Для [`StackError::downcast_ref`].
    fn as_any(&self) -> &dyn Any;
}

/// Корневая ошибка плюс след операций, через которые она прошла.
///
/// Каждый кадр следа запоминает место вызова `.context(..)`, что видно в
/// `Debug`. `Display` печатает операции снаружи внутрь:
/// `publish: topic must not be empty`.
pub struct StackError {
    root: Box<dyn ErrorExt>,
    trail: Vec<Frame>,
}

/// Один кадр следа.
#[derive(Debug, Clone)]
pub struct Frame {
    pub op: String,
    pub at: &'static Location<'static>,
}

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Box::new(err),
            trail: Vec::new(),
        }
    }

    #[track_caller]
    pub fn context(
        mut self,
        op: impl Into<String>,
    ) -> Self {
        self.trail.push(Frame {
            op: op.into(),
            at: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn log_level(&self) -> LogLevel {
        self.status_code().log_level()
    }

    /// Кадры в порядке добавления (изнутри наружу).
    pub fn trail(&self) -> &[Frame] {
        &self.trail
    }

    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let trail: Vec<String> = self
            .trail
            .iter()
            .map(|fr| format!("{} @ {}:{}", fr.op, fr.at.file(), fr.at.line()))
            .collect();
        f.debug_struct("StackError")
            .field("code", &self.status_code())
            .field("root", &self.root.to_string())
            .field("trail", &trail)
            .finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.trail.iter().rev() {
            write!(f, "{}: ", frame.op)?;
        }
        write!(f, "{}", self.root)
    }
}

impl Error for StackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

/// `.context(..)` прямо на `Result`.
pub trait ResultExt<T> {
    fn context(
        self,
        op: impl Into<String>,
    ) -> Result<T, StackError>;
}

impl<T, E: Into<StackError>> ResultExt<T> for Result<T, E> {
    #[track_caller]
    fn context(
        self,
        op: impl Into<String>,
    ) -> Result<T, StackError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(op)),
        }
    }
}
