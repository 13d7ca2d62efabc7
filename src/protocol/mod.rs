pub mod messages;
pub mod request;

pub use messages::{ControlMessage, MarkTiming, StreamDescriptor, TimingInformation, WordTiming};
pub use request::{SynthesizeRequest, TimingKind};
