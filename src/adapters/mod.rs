//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements    | Connects to                    |
//! |---------------|---------------|--------------------------------|
//! | `display`     | StatusDisplay | Log output (two text lines)    |
//! | `file_store`  | ScheduleStore | `<data dir>/time.txt`          |
//! | `json_config` | ConfigPort    | JSON config file               |
//! | `log_sink`    | EventSink     | Log output                     |
//! | `sim_board`   | Board         | Simulated shared pin levels    |
//! | `time`        | Clock         | System clock / simulated time  |

pub mod display;
pub mod file_store;
pub mod json_config;
pub mod log_sink;
pub mod sim_board;
pub mod time;
