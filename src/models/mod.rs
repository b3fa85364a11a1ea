pub mod parent_site;
pub mod survey_site;
pub mod survey_event;
pub mod vegetation;
pub mod species;
pub mod ant_record;
pub mod config;

pub use parent_site::*;
pub use survey_site::*;
pub use survey_event::*;
pub use vegetation::*;
pub use species::*;
pub use ant_record::*;
pub use config::*;
