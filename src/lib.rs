// Interrupt-to-task signaling for cooperative firmware main loops

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "board")]
pub mod board;
pub mod kernel;
