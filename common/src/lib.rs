pub mod applier;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod poller;
pub mod port;
pub mod shadow;
pub mod topics;
pub mod types;

pub use applier::{apply_delta, DeltaOutcome, Rejected};
pub use command::desired_command;
pub use config::{AgentConfig, BoardConfig, ConfigError, NetworkConfig};
pub use device::{DeviceModel, SensorSample};
pub use error::{DeviceIoError, PayloadError, SetError, ValidationError};
pub use poller::{PollTick, SensorPoller};
pub use port::{PhysicalPort, SimulatedPort};
pub use shadow::{DeltaRequest, Rejection, ShadowSnapshot, TokenGenerator, UpdateDocument, UpdateSection};
pub use topics::{ShadowTopic, ShadowTopics};
pub use types::{ChangeSet, DeviceState, MotionState, Property, PropertyKind, Reading, SensorTuple, SwitchState};
