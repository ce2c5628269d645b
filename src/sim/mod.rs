//! In-process sensor simulator (§4.12): emulates an RDT/TCP/HTTP sensor
//! endpoint for local testing without physical hardware.

pub mod sensor_simulator;

pub use sensor_simulator::SensorSimulator;
