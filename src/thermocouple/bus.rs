// src/thermocouple/bus.rs - Frame transport strategies for the converter
use crate::gpio::{Gpio, PinDirection};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus transfer failed: {0}")]
    Transfer(String),
    #[error("Bus is closed")]
    Closed,
}

/// Contract between the decoder's caller and the wire: deliver one 32-bit
/// frame, and clean up on close. Strategies are selected once at
/// construction; decoding never knows which one is underneath.
pub trait FrameBus: Send {
    fn read_frame(&mut self) -> Result<u32, BusError>;
    fn close(&mut self);
}

/// Software SPI: the frame is clocked out one bit at a time over plain
/// GPIO lines (chip select, clock, data in). 32 bits, two clock edges each.
pub struct BitBangBus {
    gpio: Arc<Mutex<dyn Gpio>>,
    cs_pin: u8,
    clock_pin: u8,
    data_pin: u8,
}

impl BitBangBus {
    pub fn new(gpio: Arc<Mutex<dyn Gpio>>, cs_pin: u8, clock_pin: u8, data_pin: u8) -> Self {
        {
            let mut g = gpio.lock().expect("gpio lock poisoned");
            g.configure(cs_pin, PinDirection::Output);
            g.configure(clock_pin, PinDirection::Output);
            g.configure(data_pin, PinDirection::Input);
            // Chip select high keeps the chip deselected until a read.
            g.write(cs_pin, true);
        }
        Self { gpio, cs_pin, clock_pin, data_pin }
    }
}

impl FrameBus for BitBangBus {
    fn read_frame(&mut self) -> Result<u32, BusError> {
        let mut gpio = self.gpio.lock().expect("gpio lock poisoned");
        let mut frame: u32 = 0;

        gpio.write(self.cs_pin, false);
        for _ in 0..32 {
            gpio.write(self.clock_pin, false);
            frame <<= 1;
            if gpio.read(self.data_pin) {
                frame |= 1;
            }
            gpio.write(self.clock_pin, true);
        }
        gpio.write(self.cs_pin, true);

        Ok(frame)
    }

    fn close(&mut self) {
        let mut gpio = self.gpio.lock().expect("gpio lock poisoned");
        gpio.configure(self.cs_pin, PinDirection::Input);
        gpio.configure(self.clock_pin, PinDirection::Input);
    }
}

/// Byte-stream capability implemented by a hardware-assisted SPI peripheral.
pub trait ByteTransfer: Send {
    /// Fill `buf` with the next bytes off the wire.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), BusError>;
    fn close(&mut self);
}

/// Hardware-assisted SPI: the peripheral hands us whole bytes and the frame
/// is their big-endian concatenation.
pub struct ByteStreamBus<T: ByteTransfer> {
    transfer: T,
}

impl<T: ByteTransfer> ByteStreamBus<T> {
    pub fn new(transfer: T) -> Self {
        Self { transfer }
    }
}

impl<T: ByteTransfer> FrameBus for ByteStreamBus<T> {
    fn read_frame(&mut self) -> Result<u32, BusError> {
        let mut buf = [0u8; 4];
        self.transfer.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn close(&mut self) {
        self.transfer.close();
    }
}
