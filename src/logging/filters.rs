use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// `RUST_LOG` имеет приоритет; иначе директива из конфигурации.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    let directive = config.build_filter_directive();

    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => match EnvFilter::try_new(&directive) {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!(
                    "Invalid log filter directive from config ('{directive}'): {e}; falling back to 'info'"
                );
                EnvFilter::new("info")
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use tracing_subscriber::{fmt, prelude::*, registry::Registry};

    use super::*;

    struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> fmt::MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Тест проверяет, что некорректный уровень не роняет сборку фильтра.
    #[test]
    #[serial]
    fn test_invalid_directive_falls_back() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "not a level!!".into(),
            ..Default::default()
        };
        let _ = build_filter_from_config(&cfg);
    }

    /// Тест проверяет фильтрацию: при уровне warn info-события движка
    /// отбрасываются.
    #[test]
    #[serial]
    fn test_filter_drops_events_below_level() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "warn".into(),
            ..Default::default()
        };
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = fmt::layer()
            .with_writer(VecMakeWriter(buffer.clone()))
            .with_ansi(false)
            .with_filter(build_filter_from_config(&cfg));
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("filtered info event");
            tracing::warn!("visible warn event");
        });

        let out = String::from_utf8_lossy(&buffer.lock().unwrap()).to_string();
        assert!(out.contains("visible warn event"));
        assert!(!out.contains("filtered info event"));
    }
}
