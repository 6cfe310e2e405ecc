use crate::document::ServerSection;
use crate::error::{Error, Result};
use crate::settings::{int_in, required};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Deployment name, typically `${APP_ENV:local}`.
    pub env_name: String,
    pub port: u16,
}

impl ServerSettings {
    pub const DEFAULT_PORT: u16 = 8001;

    pub(crate) fn from_section(section: Option<ServerSection>) -> Result<Self> {
        let section = section.unwrap_or_default();

        let env_name = required("server.env_name", section.env_name)?;
        let port = int_in(
            "server.port",
            section.port,
            Self::DEFAULT_PORT.into(),
            1..=u16::MAX.into(),
        )?;
        let port = u16::try_from(port).map_err(|_| Error::range("server.port", port, "1..=65535"))?;

        Ok(Self { env_name, port })
    }

    pub(crate) fn to_section(&self) -> ServerSection {
        ServerSection {
            env_name: Some(self.env_name.clone()),
            port: Some(self.port.into()),
            ..Default::default()
        }
    }
}
