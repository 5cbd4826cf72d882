pub mod config;
pub mod events;
pub mod timers;
pub mod tasks {
    pub mod control;
    pub mod controller;
    pub mod effects;
    pub mod sensor;
}
