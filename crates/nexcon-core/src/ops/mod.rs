pub mod depends_on_ops;
pub mod instrument;

pub use instrument::Instrument;
