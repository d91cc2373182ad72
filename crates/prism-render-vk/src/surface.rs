// SPDX-License-Identifier: CEPL-1.0
//! Swapchain parameter policy derived from what the surface reports.

use ash::vk;
use prism_render::RenderSize;

use crate::error::VkError;

/// `current_extent` carries this in both axes when the window decides the size.
pub const EXTENT_UNDEFINED: u32 = u32::MAX;

pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

const PRESENT_MODE_PREFERENCE: [vk::PresentModeKHR; 3] = [
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::IMMEDIATE,
    vk::PresentModeKHR::FIFO,
];

/// One image past the minimum so the CPU can work ahead, capped by the
/// maximum (0 means "no maximum").
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count == 0 || desired <= caps.max_image_count {
        desired
    } else {
        caps.max_image_count
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, drawable: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != EXTENT_UNDEFINED {
        return caps.current_extent;
    }
    // A driver reporting min > max gets min rather than a panic.
    vk::Extent2D {
        width: drawable
            .width
            .min(caps.max_image_extent.width)
            .max(caps.min_image_extent.width),
        height: drawable
            .height
            .min(caps.max_image_extent.height)
            .max(caps.min_image_extent.height),
    }
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, VkError> {
    match formats {
        [] => Err(VkError::NoSupportedFormat),
        // A lone UNDEFINED entry means the surface takes anything.
        [only] if only.format == vk::Format::UNDEFINED => Ok(DEFAULT_SURFACE_FORMAT),
        [first, ..] => Ok(formats
            .iter()
            .copied()
            .find(|f| {
                f.format == DEFAULT_SURFACE_FORMAT.format
                    && f.color_space == DEFAULT_SURFACE_FORMAT.color_space
            })
            .unwrap_or(*first)),
    }
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> Result<vk::PresentModeKHR, VkError> {
    PRESENT_MODE_PREFERENCE
        .into_iter()
        .find(|m| modes.contains(m))
        .or_else(|| modes.first().copied())
        .ok_or(VkError::NoSupportedPresentMode)
}

pub fn sharing_mode(graphics: u32, present: u32) -> vk::SharingMode {
    if graphics == present {
        vk::SharingMode::EXCLUSIVE
    } else {
        vk::SharingMode::CONCURRENT
    }
}

// Info only
pub fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::A2B10G10R10_UNORM_PACK32 => "A2B10G10R10_UNORM",
        _ => "OTHER",
    }
}

pub fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn size(width: u32, height: u32) -> RenderSize {
        RenderSize { width, height }
    }

    fn free_size_caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: extent(EXTENT_UNDEFINED, EXTENT_UNDEFINED),
            min_image_extent: extent(640, 480),
            max_image_extent: extent(1920, 1080),
            ..Default::default()
        }
    }

    #[test]
    fn image_count_adds_one_when_unbounded() {
        assert_eq!(choose_image_count(&free_size_caps()), 3);
    }

    #[test]
    fn image_count_respects_the_maximum() {
        for (min, max) in [(2, 3), (3, 3), (1, 8), (4, 4)] {
            let caps = vk::SurfaceCapabilitiesKHR {
                min_image_count: min,
                max_image_count: max,
                ..Default::default()
            };
            let count = choose_image_count(&caps);
            assert!(min <= count && count <= max, "{min}..{max} gave {count}");
            assert_eq!(count, choose_image_count(&caps));
        }
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1280, 720),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };
        assert_eq!(choose_extent(&caps, size(1920, 1080)), extent(1280, 720));
    }

    #[test]
    fn free_extent_clamps_each_axis() {
        let caps = free_size_caps();
        assert_eq!(choose_extent(&caps, size(1024, 768)), extent(1024, 768));
        assert_eq!(choose_extent(&caps, size(4000, 200)), extent(1920, 480));
        assert_eq!(choose_extent(&caps, size(10, 5000)), extent(640, 1080));
    }

    #[test]
    fn inverted_extent_bounds_fall_back_to_the_minimum() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_extent: extent(800, 600),
            max_image_extent: extent(640, 480),
            ..free_size_caps()
        };
        assert_eq!(choose_extent(&caps, size(1024, 768)), extent(800, 600));
        assert_eq!(choose_extent(&caps, size(100, 100)), extent(800, 600));
    }

    #[test]
    fn lone_undefined_format_means_default() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(choose_surface_format(&formats).unwrap(), DEFAULT_SURFACE_FORMAT);
    }

    #[test]
    fn exact_format_match_is_preferred() {
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let wrong_space = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        };
        let chosen = choose_surface_format(&[other, wrong_space, DEFAULT_SURFACE_FORMAT]).unwrap();
        assert_eq!(chosen, DEFAULT_SURFACE_FORMAT);
    }

    #[test]
    fn falls_back_to_first_format() {
        let first = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let second = vk::SurfaceFormatKHR {
            format: vk::Format::A2B10G10R10_UNORM_PACK32,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[first, second]).unwrap(), first);
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(VkError::NoSupportedFormat)
        ));
    }

    #[test]
    fn mailbox_wins_regardless_of_order() {
        use vk::PresentModeKHR as P;
        for modes in [
            vec![P::MAILBOX, P::FIFO],
            vec![P::FIFO, P::IMMEDIATE, P::MAILBOX],
            vec![P::IMMEDIATE, P::MAILBOX],
        ] {
            assert_eq!(choose_present_mode(&modes).unwrap(), P::MAILBOX);
        }
    }

    #[test]
    fn immediate_beats_fifo() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO, P::IMMEDIATE]).unwrap(), P::IMMEDIATE);
    }

    #[test]
    fn unknown_modes_fall_back_to_first() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO_RELAXED]).unwrap(), P::FIFO_RELAXED);
        assert!(matches!(
            choose_present_mode(&[]),
            Err(VkError::NoSupportedPresentMode)
        ));
    }

    #[test]
    fn split_families_share_concurrently() {
        assert_eq!(sharing_mode(0, 0), vk::SharingMode::EXCLUSIVE);
        assert_eq!(sharing_mode(0, 1), vk::SharingMode::CONCURRENT);
    }
}
