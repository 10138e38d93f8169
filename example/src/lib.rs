mod error;
mod pet_api_client;

pub use error::Error;
pub use pet_api_client::{Pet, PetApiClient, PetApiClientBuilder};
