pub mod clock;
pub mod qr;
