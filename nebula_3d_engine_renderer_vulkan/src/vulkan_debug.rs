//! Validation layer debug messenger (compiled only with the
//! `vulkan-validation` feature)

use std::ffi::CStr;

use ash::vk;
use colored::*;

/// Debug callback printing validation messages with severity colors
pub unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*data).p_message)
        .to_string_lossy()
        .into_owned();
    let tag = "nebula3d::vulkan".bright_blue();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        eprintln!("[{}] {} {}", tag, "VULKAN ERROR".red().bold(), message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        eprintln!("[{}] {} {}", tag, "VULKAN WARN ".yellow(), message);
    } else {
        eprintln!("[{}] {} {}", tag, "VULKAN INFO ".green(), message);
    }
    vk::FALSE
}

/// Messenger create-info used at instance creation when validation is on
pub fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}
