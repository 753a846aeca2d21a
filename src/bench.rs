//! Role-routed bench of instruments
//!
//! [`Bench`] is the stock [`InstrumentInterface`]: one boxed [`Instrument`] per [`Role`] and one
//! [`Operator`] for manual steps. Opening identifies and resets every instrument; closing puts
//! every instrument into its safe state first and only then closes them, so a failure to close one
//! instrument can never leave another with its output on.

use std::collections::BTreeMap;
use async_trait::async_trait;
use log::{ debug, info, warn };
use crate::{
    config::InstrumentConfig,
    error::{ CommunicationError, ConfigurationError },
    instrument::{ Instrument, InstrumentInterface, ManualPrompt, ManualResponse, Operator, Role },
    units::{ Quantity, QuantityKind },
};

pub struct Bench
{
    instruments: BTreeMap<Role, Box<dyn Instrument>>,
    operator: Box<dyn Operator>,
}

impl Bench
{
    pub fn new<O>(operator: O) -> Self
        where O: Operator + 'static
    {
        Self {
            instruments: BTreeMap::new(),
            operator: Box::new(operator),
        }
    }

    /// Attaches the instrument playing `role`, replacing any previous one
    pub fn attach<T>(mut self, role: Role, instrument: T) -> Self
        where T: Instrument + 'static
    {
        self.instruments.insert(role, Box::new(instrument));
        self
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_
    {
        self.instruments.keys().copied()
    }

    /// Checks that every configured role has an instrument attached
    pub fn check(&self, config: &InstrumentConfig) -> Result<(), ConfigurationError>
    {
        for role in config.roles() {
            if !self.instruments.contains_key(&role) {
                return Err(ConfigurationError::MissingInstrument(role));
            }
        }

        Ok(())
    }

    fn instrument(&mut self, role: Role) -> Result<&mut Box<dyn Instrument>, CommunicationError>
    {
        self.instruments
            .get_mut(&role)
            .ok_or(CommunicationError::Unattached(role))
    }
}

#[async_trait]
impl InstrumentInterface for Bench
{
    async fn open(&mut self) -> Result<(), CommunicationError>
    {
        for (role, instrument) in self.instruments.iter_mut() {
            let identity = instrument.identify().await?;
            info!("{}: {}", role, identity);
            instrument.reset().await?;
        }

        Ok(())
    }

    async fn set_value(&mut self, role: Role, value: Quantity) -> Result<Option<Quantity>, CommunicationError>
    {
        debug!("{} <- {:.7}", role, value);
        self.instrument(role)?.set_value(value).await
    }

    async fn read_value(&mut self, role: Role, kind: QuantityKind) -> Result<Quantity, CommunicationError>
    {
        let reading = self.instrument(role)?.read_value(kind).await?;
        debug!("{} -> {:.7}", role, reading);
        Ok(reading)
    }

    async fn read_setpoint(&mut self, role: Role, kind: QuantityKind) -> Result<Quantity, CommunicationError>
    {
        self.instrument(role)?.read_setpoint(kind).await
    }

    async fn prompt_manual_step(&mut self, prompt: &ManualPrompt) -> ManualResponse
    {
        self.operator.acknowledge(prompt).await
    }

    async fn close(&mut self)
    {
        info!("safe shutdown");

        for (role, instrument) in self.instruments.iter_mut() {
            match instrument.safe_state().await {
                Ok(()) => debug!("{}: safe", role),
                Err(err) => warn!("{}: could not reach a safe state: {}", role, err),
            }
        }

        for (role, instrument) in self.instruments.iter_mut() {
            if let Err(err) = instrument.close().await {
                warn!("{}: close failed: {}", role, err);
            }
        }
    }
}
