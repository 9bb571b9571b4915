//! Ошибки движка pub/sub и его C-границы.
//!
//! Операции возвращают [`PubSubResult`]. Корень ошибки ([`PubSubError`] или
//! [`BoundaryError`]) несёт [`StatusCode`], который граница отдаёт наружу
//! через `pubsub_last_error_code`, а [`StackError`] добавляет к нему след
//! операций.

pub mod error;
pub mod macros;
pub mod stack;
pub mod status_code;

pub use error::*;
pub use stack::*;
pub use status_code::*;

pub type PubSubResult<T> = Result<T, StackError>;
