//! Applies configuration commands to a [`Sensor`].

use tracing::{info, warn};

use crate::command::{Command, CommandKind};
use crate::error::SensorError;
use crate::sensor::{Mode, Sensor, SensorBus};

/// Counters kept by a [`Dispatcher`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub applied: u64,
    pub rejected: u64,
}

/// Interprets [`Command`]s on the consumer side of the configuration channel.
///
/// Every command kind is handled here; anything unknown was already filtered
/// out when the control message was decoded. Rejected changes are logged and
/// otherwise ignored.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn apply<B: SensorBus>(&mut self, cmd: Command, sensor: &mut Sensor<B>) {
        let value = cmd.value;
        let result = match cmd.kind {
            CommandKind::Prescaler => {
                info!("setting prescaler to {:.0}", value);
                sensor.set_prescaler(value)
            }
            CommandKind::Baseline => {
                info!("reset baseline");
                sensor.update_baseline()
            }
            CommandKind::NoiseThreshold => {
                info!("setting noise threshold to {}", value);
                sensor.set_noise_threshold(value)
            }
            CommandKind::NumBits => {
                let num_bits = value as i32;
                info!("setting number of bits to {}", num_bits);
                let speed = sensor.config().speed;
                match u8::try_from(num_bits) {
                    Ok(bits) => sensor.set_scan_settings(speed, bits),
                    Err(_) => Err(SensorError::OutOfRange { setting: "number of bits", value }),
                }
            }
            CommandKind::Mode => match Mode::try_from(value as i32) {
                Ok(mode) => {
                    info!(?mode, "setting mode to {:.0}", value);
                    sensor.set_mode(mode)
                }
                Err(code) => {
                    warn!(code, "ignoring unknown sensor mode");
                    self.stats.rejected += 1;
                    return;
                }
            },
        };

        match result {
            Ok(()) => self.stats.applied += 1,
            Err(err) => {
                warn!(kind = ?cmd.kind, %err, "command rejected");
                self.stats.rejected += 1;
            }
        }
    }
}
