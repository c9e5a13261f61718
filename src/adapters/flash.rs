//! OTA partition flash sink.
//!
//! - **`target_os = "espidf"`**: `esp-ota` writes into the inactive app
//!   slot.  Dropping an unfinished `OtaUpdate` aborts it, which is what
//!   [`FlashSink::abort`] relies on.
//! - **host**: collects the image in memory so the full pipeline can run
//!   in simulation.

use log::{info, warn};

use crate::app::ports::FlashSink;
use crate::error::FlashError;

pub struct OtaFlash {
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
    #[cfg(not(target_os = "espidf"))]
    image: Option<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    committed: Option<Vec<u8>>,
}

impl Default for OtaFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl OtaFlash {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            update: None,
            #[cfg(not(target_os = "espidf"))]
            image: None,
            #[cfg(not(target_os = "espidf"))]
            committed: None,
        }
    }

    /// Image selected for next boot in simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn committed(&self) -> Option<&[u8]> {
        self.committed.as_deref()
    }
}

#[cfg(target_os = "espidf")]
impl FlashSink for OtaFlash {
    fn begin(&mut self, size_hint: Option<u32>) -> Result<(), FlashError> {
        // esp-ota always opens in "size unknown" mode and erases as it goes.
        self.update.take();
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {:?}", e);
            FlashError::BeginFailed
        })?;
        self.update = Some(update);
        info!("flash: OTA slot open (hint={:?})", size_hint);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        let update = self.update.as_mut().ok_or(FlashError::NotOpen)?;
        update.write(data).map_err(|e| {
            warn!("esp-ota write failed: {:?}", e);
            FlashError::WriteFailed
        })
    }

    fn end(&mut self) -> Result<(), FlashError> {
        let update = self.update.take().ok_or(FlashError::NotOpen)?;
        let mut completed = update.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            FlashError::VerifyFailed
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            FlashError::BootSetFailed
        })?;
        info!("flash: new image set as boot partition");
        Ok(())
    }

    fn abort(&mut self) {
        if self.update.take().is_some() {
            warn!("flash: OTA write aborted");
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl FlashSink for OtaFlash {
    fn begin(&mut self, size_hint: Option<u32>) -> Result<(), FlashError> {
        let capacity = size_hint.unwrap_or(0) as usize;
        self.image = Some(Vec::with_capacity(capacity));
        info!("flash (sim): OTA slot open (hint={:?})", size_hint);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        let image = self.image.as_mut().ok_or(FlashError::NotOpen)?;
        image.extend_from_slice(data);
        Ok(())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        let image = self.image.take().ok_or(FlashError::NotOpen)?;
        info!("flash (sim): committed {} bytes", image.len());
        self.committed = Some(image);
        Ok(())
    }

    fn abort(&mut self) {
        if self.image.take().is_some() {
            warn!("flash (sim): OTA write aborted");
        }
    }
}
