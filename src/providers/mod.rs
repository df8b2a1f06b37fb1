//! Clients for the external services the bot bridges.

pub mod spark;
pub mod zabbix;

pub use spark::SparkClient;
pub use zabbix::ZabbixClient;
