//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                       | Connects to                  |
//! |-------------|----------------------------------|------------------------------|
//! | `regmap`    | RegisterPort                     | I2C bus / in-memory map      |
//! | `hardware`  | RegisterPort, SupplyPort,        | Codec registers, board GPIOs |
//! |             | BiasPort, SwitchLines            |                              |
//! | `sim`       | all hardware ports               | Simulated jack and codec     |
//! | `log_sink`  | ReportSink                       | `log` output (text or JSON)  |
//! | `recorder`  | ReportSink                       | In-memory event buffer       |

pub mod hardware;
pub mod log_sink;
pub mod recorder;
pub mod regmap;
pub mod sim;
