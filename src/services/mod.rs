pub mod ai;
pub mod calendar;
pub mod conversation;
pub mod extraction;
pub mod mail;
pub mod memory;
pub mod scheduling;
pub mod voice;
