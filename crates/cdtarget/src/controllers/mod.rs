pub mod cdtarget_controller;
pub mod children;
pub mod upgradeable;
