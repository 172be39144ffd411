//! Line based console for poking the simulated node from a terminal.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Error};
use common::{
    zcl::{AttributeUpdateMessage, AttributeValue, CustomCommandMessage, ZCL_TYPE_U8},
    ZclStatus,
};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{sim::SimulatedPin, sim::SimulatedStack, zigbee::ZigbeeHandle};

const CLICK_HOLD: Duration = Duration::from_millis(50);

const HELP: &str = "commands: press [pin] | release [pin] | click [pin] | identify on|off | \
attr <cluster> <attribute> <value> | cmd <cluster> <command> | fail <count> | status | help";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Press(Option<u8>),
    Release(Option<u8>),
    Click(Option<u8>),
    Identify(bool),
    Attribute { cluster: u16, attribute: u16, value: u8 },
    Custom { cluster: u16, command: u8 },
    FailSteering(u32),
    Status,
    Help,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("press", [pin @ ..]) => Command::Press(optional_pin(pin)?),
            ("release", [pin @ ..]) => Command::Release(optional_pin(pin)?),
            ("click", [pin @ ..]) => Command::Click(optional_pin(pin)?),
            ("identify", ["on"]) => Command::Identify(true),
            ("identify", ["off"]) => Command::Identify(false),
            ("attr", [cluster, attribute, value]) => Command::Attribute {
                cluster: parse_number(cluster)?,
                attribute: parse_number(attribute)?,
                value: parse_number(value)?,
            },
            ("cmd", [cluster, command]) => Command::Custom {
                cluster: parse_number(cluster)?,
                command: parse_number(command)?,
            },
            ("fail", [count]) => Command::FailSteering(parse_number(count)?),
            ("status", []) => Command::Status,
            ("help", []) => Command::Help,
            _ => bail!("unknown command: {}", line.trim()),
        };

        Ok(command)
    }
}

fn optional_pin(args: &[&str]) -> Result<Option<u8>, Error> {
    match args {
        [] => Ok(None),
        [pin] => parse_number(pin).map(Some),
        _ => bail!("expected at most one pin"),
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number<T>(text: &str) -> Result<T, Error>
where
    T: TryFrom<u32>,
{
    let value = match text.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    }
    .with_context(|| format!("invalid number: {}", text))?;

    T::try_from(value).map_err(|_| anyhow!("out of range: {}", text))
}

pub struct Console {
    stack: Arc<SimulatedStack>,
    buttons: Vec<(u8, SimulatedPin)>,
    handle: ZigbeeHandle,
    endpoint: u8,
}

impl Console {
    pub fn new(
        stack: Arc<SimulatedStack>,
        buttons: Vec<(u8, SimulatedPin)>,
        handle: ZigbeeHandle,
        endpoint: u8,
    ) -> Self {
        Self {
            stack,
            buttons,
            handle,
            endpoint,
        }
    }

    /// Reads commands from stdin until it closes.
    pub async fn run(self) {
        info!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let result = match line.parse::<Command>() {
                Ok(command) => self.execute(command).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!("{:#}", e);
            }
        }

        info!("Console closed");
    }

    pub async fn execute(&self, command: Command) -> Result<(), Error> {
        match command {
            Command::Press(pin) => self.button(pin)?.press(),
            Command::Release(pin) => self.button(pin)?.release(),
            Command::Click(pin) => {
                let button = self.button(pin)?;
                button.press();
                tokio::time::sleep(CLICK_HOLD).await;
                button.release();
            }
            Command::Identify(identifying) => {
                if !self.stack.simulate_identify(identifying) {
                    bail!("identify handler not registered yet");
                }
            }
            Command::Attribute {
                cluster,
                attribute,
                value,
            } => {
                let status = self.stack.simulate_attribute_write(&AttributeUpdateMessage {
                    status: ZclStatus::SUCCESS,
                    endpoint: self.endpoint,
                    cluster,
                    attribute,
                    value: AttributeValue::new(ZCL_TYPE_U8, vec![value]),
                });
                info!("Attribute write returned {}", status);
            }
            Command::Custom { cluster, command } => {
                let status = self.stack.simulate_custom_command(&CustomCommandMessage {
                    status: ZclStatus::SUCCESS,
                    endpoint: self.endpoint,
                    cluster,
                    command,
                    data: AttributeValue::default(),
                });
                info!("Custom command returned {}", status);
            }
            Command::FailSteering(count) => {
                self.stack.fail_next_steering(count);
                info!("Next {} steering attempts will fail", count);
            }
            Command::Status => match self.handle.network_status() {
                Some(network) => info!("Joined ({})", network),
                None => info!("Not joined"),
            },
            Command::Help => info!("{}", HELP),
        }

        Ok(())
    }

    fn button(&self, pin: Option<u8>) -> Result<&SimulatedPin, Error> {
        let found = match pin {
            Some(pin) => self.buttons.iter().find(|(gpio, _)| *gpio == pin),
            None => self.buttons.first(),
        };
        found
            .map(|(_, button)| button)
            .ok_or_else(|| anyhow!("no button on that pin"))
    }
}
