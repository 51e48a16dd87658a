//! Unit tests for vulkan_instance.rs

use super::*;

#[test]
fn test_validation_follows_feature_and_config() {
    let mut config = Config::default();

    config.enable_validation = true;
    assert_eq!(validation_requested(&config), cfg!(feature = "vulkan-validation"));

    config.enable_validation = false;
    assert!(!validation_requested(&config));
}

#[test]
fn test_default_config_validates_debug_builds_only() {
    let config = Config::default();
    assert_eq!(
        validation_requested(&config),
        cfg!(feature = "vulkan-validation") && cfg!(debug_assertions)
    );
}

#[test]
fn test_validation_layer_name() {
    assert_eq!(VALIDATION_LAYER.to_str(), Ok("VK_LAYER_KHRONOS_validation"));
}
