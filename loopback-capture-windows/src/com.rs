//! RAII wrappers for COM apartment and task-memory lifetimes.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::rc::Rc;

use windows::Win32::System::Com::*;

use loopback_capture_core::models::error::CaptureError;

/// Keeps the calling thread's COM apartment alive.
///
/// Every interface wrapper holds an `Rc` to it, so `CoUninitialize` only
/// runs after the last interface has been released. Not `Send`: COM
/// objects created here stay on this thread.
pub struct ComApartment {
    _not_send: PhantomData<*const ()>,
}

impl ComApartment {
    pub fn initialize() -> Result<Rc<Self>, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::DeviceEnumeration(format!("CoInitializeEx failed: {}", e)))?;
        }
        Ok(Rc::new(Self { _not_send: PhantomData }))
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// Owner of a `CoTaskMemAlloc` allocation handed out by the OS.
pub struct CoTaskMem<T> {
    ptr: *mut T,
}

impl<T> CoTaskMem<T> {
    /// # Safety
    /// `ptr` must be null or a live `CoTaskMemAlloc` allocation that nothing
    /// else frees.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self { ptr }
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl<T> Drop for CoTaskMem<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                CoTaskMemFree(Some(self.ptr as *const c_void));
            }
        }
    }
}
