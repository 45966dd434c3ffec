pub mod audio;
pub mod backend;
pub mod controller;
pub mod external;
pub mod library;
pub mod playlist;
pub mod queue;
pub mod track;
