pub mod disease;
pub mod history;
pub mod market;
pub mod voice;
pub mod weather;
