//! The physical CD drive's controller chips: the error-correction/host-interface CDC, the
//! nibble-serial CDD command/status MCU, and the audio fader that sits between the two.

pub mod cdc;
pub mod cdd;
pub mod fader;
