// HTTP clients for the lookup commands.

pub mod lookup_clients;

pub use lookup_clients::{ChuckNorrisClient, WikipediaClient, XkcdClient};
