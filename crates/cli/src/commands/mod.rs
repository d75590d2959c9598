pub mod chat;
pub mod daemon;
pub mod doctor;
pub mod onboard;
pub mod routines;
pub mod tasks;
pub mod tick;
