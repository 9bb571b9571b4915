//! Демонстрация движка pub/sub.
//!
//! Сценарий: `subscriber1` получает сообщения темы через обработчик,
//! `subscriber2` через очередь. После двух публикаций очередь вычитывается,
//! `subscriber1` отписывается, третья публикация доходит только до очереди.
//! С `--ffi` тот же сценарий идёт через C ABI.

use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_void},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use pubsub_core::{
    ffi::{self, MAX_MESSAGE_SIZE, MAX_TOPIC_SIZE},
    init_logging, EngineConfig, LogFormat, LoggingConfig, PubSubEngine, StatusCode,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "pubsub-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs the callback + queue pub/sub scenario", long_about = None)]
struct Cli {
    /// Тема сценария
    #[arg(short, long, default_value = "news")]
    topic: String,
    /// Идти через C ABI вместо Rust API. Процессный движок C ABI читает
    /// конфигурацию только из окружения, поэтому с `--config` несовместим.
    #[arg(long, conflicts_with = "config")]
    ffi: bool,
    /// Уровень логирования
    #[arg(short, long, default_value = "info", env = "PUBSUB_LOG_LEVEL")]
    log_level: String,
    /// Формат логов: pretty, compact, json
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,
    /// Файл конфигурации движка (toml/json/yaml)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Вывести статистику движка в JSON в конце
    #[arg(long)]
    stats: bool,
}

const MESSAGES: [&str; 3] = [
    "Breaking news: the engine works!",
    "More news: pub/sub is operational",
    "Final update: subscriber1 won't see this",
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
        ..Default::default()
    })
    .map_err(|e| anyhow::anyhow!("logging init failed: {e}"))?;

    if cli.ffi {
        run_ffi(&cli.topic)?;
        if cli.stats {
            print_stats(ffi::default_engine())?;
        }
    } else {
        let config = match &cli.config {
            Some(path) => EngineConfig::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => EngineConfig::load().context("failed to load config from environment")?,
        };
        let engine = PubSubEngine::new(config);
        run_native(&engine, &cli.topic)?;
        if cli.stats {
            print_stats(&engine)?;
        }
    }
    Ok(())
}

fn run_native(
    engine: &PubSubEngine,
    topic: &str,
) -> Result<()> {
    engine.subscribe_fn("subscriber1", topic, |t: &str, m: &str| {
        println!("Callback received: Topic={t}, Message={m}");
    })?;
    engine.subscribe("subscriber2", topic, None)?;

    println!("Publishing messages...");
    for msg in &MESSAGES[..2] {
        engine.publish(topic, msg)?;
    }

    println!("\nChecking messages for subscriber2:");
    while let Some(msg) = engine.get_next_message("subscriber2", None) {
        println!("Retrieved message: Topic={}, Content={}", msg.topic(), msg.content());
    }

    println!("\nUnsubscribing subscriber1 from {topic}");
    engine.unsubscribe("subscriber1", Some(topic))?;
    let report = engine.publish(topic, MESSAGES[2])?;
    info!(recipients = report.recipients(), "final publish");

    println!("\nChecking messages for subscriber2 again:");
    match engine.get_next_message("subscriber2", None) {
        Some(msg) => println!("Retrieved message: Topic={}, Content={}", msg.topic(), msg.content()),
        None => println!("No messages for subscriber2"),
    }

    println!("\nUnsubscribing subscriber2 from all topics");
    engine.unsubscribe("subscriber2", None)?;
    Ok(())
}

extern "C" fn print_callback(
    topic: *const c_char,
    message: *const c_char,
    user_data: *mut c_void,
) {
    // SAFETY: движок передаёт валидные строки на время вызова; user_data
    // указывает на счётчик, живущий дольше подписки.
    let (topic, message, hits) = unsafe {
        (
            CStr::from_ptr(topic).to_string_lossy(),
            CStr::from_ptr(message).to_string_lossy(),
            &*(user_data as *const AtomicUsize),
        )
    };
    hits.fetch_add(1, Ordering::Relaxed);
    println!("Callback received: Topic={topic}, Message={message}");
}

fn run_ffi(topic: &str) -> Result<()> {
    let sub1 = CString::new("subscriber1")?;
    let sub2 = CString::new("subscriber2")?;
    let topic_c = CString::new(topic)?;
    let hits = AtomicUsize::new(0);
    let hits_ptr = &hits as *const AtomicUsize as *mut c_void;

    ensure_ok(
        ffi::subscribe(sub1.as_ptr(), topic_c.as_ptr(), Some(print_callback), hits_ptr),
        "subscribe subscriber1",
    )?;
    ensure_ok(
        ffi::subscribe(sub2.as_ptr(), topic_c.as_ptr(), None, std::ptr::null_mut()),
        "subscribe subscriber2",
    )?;

    println!("Publishing messages...");
    for msg in &MESSAGES[..2] {
        let msg = CString::new(*msg)?;
        ensure_ok(ffi::publish(topic_c.as_ptr(), msg.as_ptr()), "publish")?;
    }

    println!("\nChecking messages for subscriber2:");
    while let Some((t, m)) = next_ffi_message(&sub2) {
        println!("Retrieved message: Topic={t}, Content={m}");
    }

    println!("\nUnsubscribing subscriber1 from {topic}");
    ensure_ok(
        ffi::unsubscribe(sub1.as_ptr(), topic_c.as_ptr()),
        "unsubscribe subscriber1",
    )?;
    let last = CString::new(MESSAGES[2])?;
    ensure_ok(ffi::publish(topic_c.as_ptr(), last.as_ptr()), "publish")?;

    println!("\nChecking messages for subscriber2 again:");
    match next_ffi_message(&sub2) {
        Some((t, m)) => println!("Retrieved message: Topic={t}, Content={m}"),
        None => println!("No messages for subscriber2"),
    }

    println!("\nUnsubscribing subscriber2 from all topics");
    ensure_ok(
        ffi::unsubscribe(sub2.as_ptr(), std::ptr::null()),
        "unsubscribe subscriber2",
    )?;
    info!(callbacks = hits.load(Ordering::Relaxed), "ffi scenario finished");
    Ok(())
}

fn next_ffi_message(subscriber: &CStr) -> Option<(String, String)> {
    let mut topic = vec![0 as c_char; MAX_TOPIC_SIZE];
    let mut message = vec![0 as c_char; MAX_MESSAGE_SIZE];
    if !ffi::get_next_message(
        subscriber.as_ptr(),
        std::ptr::null(),
        topic.as_mut_ptr(),
        topic.len(),
        message.as_mut_ptr(),
        message.len(),
    ) {
        return None;
    }
    // SAFETY: get_next_message всегда ставит терминатор в непустой буфер
    let (t, m) = unsafe {
        (
            CStr::from_ptr(topic.as_ptr()).to_string_lossy().into_owned(),
            CStr::from_ptr(message.as_ptr()).to_string_lossy().into_owned(),
        )
    };
    Some((t, m))
}

fn ensure_ok(
    ok: bool,
    what: &str,
) -> Result<()> {
    if !ok {
        let code = StatusCode::try_from(ffi::pubsub_last_error_code())
            .map_or_else(|_| "no code".to_string(), |c| c.to_string());
        let ptr = ffi::pubsub_last_error();
        let reason = if ptr.is_null() {
            "unknown error".to_string()
        } else {
            // SAFETY: указатель валиден до следующего вызова на этом потоке
            unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
        };
        bail!("{what} failed [{code}]: {reason}");
    }
    Ok(())
}

fn print_stats(engine: &PubSubEngine) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    Ok(())
}
