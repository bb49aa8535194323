//! Per-thread COM apartment and MMCSS registration.

use std::cell::RefCell;

use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use crate::error::{ComContext, WasapiError};

/// COM initialized on this thread; uninitialized when the thread exits.
struct ComApartment {
    owned: bool,
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// MMCSS "Pro Audio" registration, reverted when the thread exits.
struct MmcssRegistration(HANDLE);

impl Drop for MmcssRegistration {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = AvRevertMmThreadCharacteristics(self.0) {
                log::debug!("AvRevertMmThreadCharacteristics failed: {}", e);
            }
        }
    }
}

thread_local! {
    static APARTMENT: RefCell<Option<ComApartment>> = const { RefCell::new(None) };
    static MMCSS: RefCell<Option<MmcssRegistration>> = const { RefCell::new(None) };
}

/// Join the multithreaded apartment on the calling thread, once.
///
/// Endpoints are opened on the control thread and driven from the loop thread,
/// so both must live in the MTA.
pub fn ensure_mta() -> std::result::Result<(), WasapiError> {
    APARTMENT.with(|slot| -> std::result::Result<(), WasapiError> {
        if slot.borrow().is_some() {
            return Ok(());
        }
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        let owned = if hr == RPC_E_CHANGED_MODE {
            log::warn!("Thread already joined a single-threaded apartment; using it as is");
            false
        } else {
            hr.ok().context("CoInitializeEx")?;
            true
        };
        *slot.borrow_mut() = Some(ComApartment { owned });
        Ok(())
    })
}

/// Register the calling thread with MMCSS under the "Pro Audio" task, once.
///
/// Failure only costs scheduling priority, so it is logged and ignored.
pub fn register_pro_audio_thread() {
    MMCSS.with(|slot| {
        if slot.borrow().is_some() {
            return;
        }
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        match unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            Ok(handle) => {
                log::debug!("MMCSS Pro Audio registered (task index {})", task_index);
                *slot.borrow_mut() = Some(MmcssRegistration(handle));
            }
            Err(e) => log::warn!("MMCSS registration failed: {}", e),
        }
    })
}
