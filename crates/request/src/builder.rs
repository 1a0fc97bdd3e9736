use crate::{ClientConfig, ClientFactory, error::Result};

/// Collects tunables for a [`ClientFactory`].
///
/// Setters do no validation; zero values are reported by [`build`](Self::build).
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct FactoryBuilder {
    config: ClientConfig,
}

impl FactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub const fn connection_request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.connection_request_timeout_seconds = seconds;
        self
    }

    pub const fn connect_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.connect_timeout_seconds = seconds;
        self
    }

    pub const fn socket_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.socket_timeout_seconds = seconds;
        self
    }

    pub const fn max_total_connections_in_pool(mut self, max: usize) -> Self {
        self.config.max_total_connections_in_pool = max;
        self
    }

    pub const fn max_connections_per_route(mut self, max: usize) -> Self {
        self.config.max_connections_per_route = max;
        self
    }

    pub const fn idle_connection_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.idle_connection_timeout_seconds = seconds;
        self
    }

    /// Build the factory and its connection pool.
    ///
    /// The builder is consumed: the factory exclusively owns the pool it
    /// creates, so one builder can never hand the same pool to two factories.
    ///
    /// ```compile_fail
    /// let builder = pooled_https::FactoryBuilder::new();
    /// let first = builder.build();
    /// let second = builder.build();
    /// ```
    ///
    /// # Errors
    /// [`Error::InvalidConfig`](crate::Error::InvalidConfig) if any tunable
    /// is zero, [`Error::Build`](crate::Error::Build) if the HTTPS transport
    /// cannot be assembled.
    pub fn build(self) -> Result<ClientFactory> {
        ClientFactory::build(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn setters_overwrite_fields() {
        let b = FactoryBuilder::new()
            .connection_request_timeout_seconds(1)
            .connect_timeout_seconds(2)
            .socket_timeout_seconds(3)
            .max_total_connections_in_pool(4)
            .max_connections_per_route(5)
            .idle_connection_timeout_seconds(6);
        assert_eq!(
            b.config,
            ClientConfig {
                connection_request_timeout_seconds: 1,
                connect_timeout_seconds: 2,
                socket_timeout_seconds: 3,
                max_total_connections_in_pool: 4,
                max_connections_per_route: 5,
                idle_connection_timeout_seconds: 6,
            }
        );
    }

    #[test]
    fn build_rejects_zero_at_build_time() {
        let b = FactoryBuilder::new().connect_timeout_seconds(0);
        assert!(matches!(
            b.build(),
            Err(Error::InvalidConfig {
                field: "connect_timeout_seconds",
                value: 0
            })
        ));
    }

    #[test]
    fn build_without_runtime() {
        let factory = FactoryBuilder::new().build().unwrap();
        assert_eq!(factory.config(), &ClientConfig::default());
        factory.close();
    }

    #[test]
    fn from_config_round_trips() {
        let config = ClientConfig {
            max_connections_per_route: 7,
            ..ClientConfig::default()
        };
        let factory = FactoryBuilder::from_config(config.clone()).build().unwrap();
        assert_eq!(factory.config(), &config);
        assert_eq!(factory.stats().max_per_route, 7);
    }
}
