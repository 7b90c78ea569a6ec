pub mod classify;
pub mod codec;
pub mod exchange;
pub mod transport;

pub use exchange::ExchangeResult;
pub use transport::{
    create_client, create_client_with_resolver, AddressResolver, DnsClient, Options,
    SystemResolver, Transport,
};
