pub mod request_id;
pub mod spa_dir;

pub use spa_dir::SpaDir;
