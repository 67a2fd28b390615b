//! # Strobe Simulation Kernel
//!
//! A gate-level discrete-event simulation kernel over a 4-valued (0/1/X/Z)
//! device/node graph, with a static timing analyzer. Netlist front ends
//! build a [`Network`] through the construction API, finalize it once, then
//! reset and run it any number of times; waveform viewers read results back
//! through the sampling API.
//!
//! ## Design Principles
//!
//! - **Two-event model**: every output change is a contamination event (the
//!   value *may* start changing, the node goes to X) followed by a
//!   propagation event (the settled value commits). At any timestamp all
//!   contamination processing strictly precedes all propagation processing.
//! - **Deterministic batches**: values commit only at timestamp batch
//!   boundaries and devices are evaluated in id order, so identical graphs
//!   and stimuli always produce identical waveforms.
//! - **Arena everything**: events live in a leftist-tree arena with a
//!   free-list, history in append-only block pages; steady-state simulation
//!   does not allocate.
//!
//! ## Quick Start
//!
//! ```rust
//! use strobe::{DeviceParams, GateFn, LogicValue, Network};
//!
//! let mut net = Network::new();
//! net.add_dc_source("va", "a", LogicValue::One);
//! net.add_dc_source("vb", "b", LogicValue::One);
//! let params = DeviceParams { tcd: 1.0, tpdr: 2.0, tpdf: 2.0, ..Default::default() };
//! net.add_gate("g1", GateFn::And, &["a", "b"], "y", params);
//!
//! net.finalize().unwrap();
//! net.reset().unwrap();
//! net.run(100.0).unwrap();
//!
//! assert_eq!(net.node_value("y").unwrap(), LogicValue::One);
//! ```
//!
//! ## Timing Analysis
//!
//! ```rust,ignore
//! let report = net.analyze_timing()?;
//! for path in &report.critical_paths {
//!     println!("{:.2} ns to {}", path.delay, path.sink);
//! }
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use strobe::config::SimConfig;
//!
//! let config = SimConfig::from_yaml_file("simulation.yaml")?;
//! let mut net = Network::with_config(config);
//! ```

pub mod types;
pub mod logic;
pub mod table;
pub mod event;
pub mod queue;
pub mod node;
pub mod device;
pub mod network;
pub mod history;
pub mod timing;
pub mod config;
pub mod stats;
pub mod error;

// Re-export commonly used types
pub use types::{DeviceId, EventId, NodeId, SimTime};
pub use logic::{LogicValue, LogicWord};
pub use table::{GateFn, LookupTable};
pub use event::{Event, EventKind};
pub use queue::EventQueue;
pub use node::Node;
pub use device::{Device, DeviceKind, DeviceParams, MemoryPort, PortKind};
pub use network::{KernelState, Network, PortSpec};
pub use history::History;
pub use timing::{HoldCheck, SetupCheck, TimingPath, TimingReport};
pub use config::{ConfigError, SimConfig, SimConfigBuilder};
pub use error::{CancelToken, GraphError};
pub use stats::{KernelStats, SimulationStats, Timer};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// strobe::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
