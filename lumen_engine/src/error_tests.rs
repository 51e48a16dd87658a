//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("Failed to load Vulkan library".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("Failed to load Vulkan library"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("swapchain extent is 0x0".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("0x0"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("vkCreateInstance returned ERROR_INCOMPATIBLE_DRIVER".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("ERROR_INCOMPATIBLE_DRIVER"));
}

#[test]
fn test_no_suitable_device_display() {
    let err = Error::NoSuitableDevice("2 devices checked".to_string());
    let display = format!("{}", err);
    assert!(display.contains("No suitable GPU"));
    assert!(display.contains("2 devices checked"));
}

#[test]
fn test_vulkan_call_display_names_the_call() {
    let err = Error::vulkan_call("vkQueueSubmit", "ERROR_DEVICE_LOST");
    let display = format!("{}", err);
    assert!(display.starts_with("vkQueueSubmit failed"));
    assert!(display.contains("ERROR_DEVICE_LOST"));
}

#[test]
fn test_vulkan_call_constructor_fields() {
    #[derive(Debug)]
    struct FakeCode;

    match Error::vulkan_call("vkCreateFence", FakeCode) {
        Error::VulkanCall { call, code } => {
            assert_eq!(call, "vkCreateFence");
            assert_eq!(code, "FakeCode");
        }
        other => panic!("unexpected variant: {:?}", other),
    }
}

#[test]
fn test_descriptor_pool_exhausted_display() {
    let display = format!("{}", Error::DescriptorPoolExhausted);
    assert!(display.contains("freshly created pool"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    let debug1 = format!("{:?}", Error::BackendError("test".to_string()));
    assert!(debug1.contains("BackendError"));

    let debug2 = format!("{:?}", Error::vulkan_call("vkAcquireNextImageKHR", -4));
    assert!(debug2.contains("VulkanCall"));
    assert!(debug2.contains("vkAcquireNextImageKHR"));
}

#[test]
fn test_error_clone_and_eq() {
    let err1 = Error::vulkan_call("vkCreateDevice", "ERROR_FEATURE_NOT_PRESENT");
    let err2 = err1.clone();
    assert_eq!(err1, err2);
    assert_ne!(err1, Error::OutOfMemory);
}

// ============================================================================
// RESULT TYPE TESTS
// ============================================================================

#[test]
fn test_result_type_err() {
    fn returns_error() -> Result<i32> {
        Err(Error::OutOfMemory)
    }

    let result = returns_error();
    assert!(result.is_err());

    if let Err(e) = result {
        assert_eq!(format!("{}", e), "Out of GPU memory");
    }
}

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<i32> {
        Err(Error::DescriptorPoolExhausted)
    }

    fn outer() -> Result<i32> {
        inner()?;
        Ok(42)
    }

    assert_eq!(outer(), Err(Error::DescriptorPoolExhausted));
}
