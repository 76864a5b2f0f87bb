use minarch_core::convert::{PixelConverter, PixelFormat};
use minarch_core::rate_meter::RateMeter;
use minarch_core::rotation::{Rotation, RotationBuffer};
use minarch_core::scaler::{blit, calculate, Boxing, Effect, ScalerInput, ScalerKind, ScalingMode, Sharpness};

fn canvas_pixel(canvas: &[u8], pitch: i32, x: i32, y: i32) -> u16 {
    let at = (y * pitch + x * 2) as usize;
    u16::from_le_bytes([canvas[at], canvas[at + 1]])
}

#[test]
pub fn test_snes_native_on_vga() {
    let inp = ScalerInput {
        src_w: 256,
        src_h: 224,
        src_p: 512,
        aspect_ratio: 4.0 / 3.0,
        mode: ScalingMode::Native,
        device_w: 640,
        device_h: 480,
        device_p: 1280,
        fit: true,
        buffer_w: 960,
        buffer_h: 720,
        ..Default::default()
    };
    let r = calculate(&inp);

    assert_eq!(r.scale, 2);
    assert_eq!((r.dst_w, r.dst_h), (512, 448));
    assert_eq!((r.dst_x, r.dst_y), (64, 16));
}

#[test]
pub fn test_psx_aspect_on_oversized_device() {
    let inp = ScalerInput {
        src_w: 320,
        src_h: 240,
        src_p: 640,
        aspect_ratio: 4.0 / 3.0,
        mode: ScalingMode::Aspect,
        device_w: 1920,
        device_h: 1080,
        device_p: 3840,
        fit: false,
        hdmi_width: 1280,
        ..Default::default()
    };
    let r = calculate(&inp);

    assert!(matches!(r.kind, ScalerKind::Aspect(_, Boxing::Pillarbox)));
    assert!((r.aspect - 1.333).abs() < 0.001);
    assert_eq!(r.dst_w % 8, 0);
    assert_eq!(r.dst_x * 2 + r.dst_w, r.canvas_w);
}

/// A portrait 0RGB1555 core, rotated onto a landscape screen and drawn end to end.
#[test]
pub fn test_rotated_portrait_frame_end_to_end() {
    let (w, h) = (240usize, 320usize);
    // White top row, black elsewhere.
    let mut raw = vec![0u8; w * h * 2];
    for x in 0..w {
        raw[x * 2..x * 2 + 2].copy_from_slice(&0x7FFFu16.to_le_bytes());
    }

    let mut converter = PixelConverter::new();
    let converted = converter.convert(PixelFormat::Rgb1555, &raw, w, h, w * 2).unwrap();
    let mut rotation = RotationBuffer::new();
    let rotated = rotation.apply(
        Rotation::Ccw90,
        converted.data,
        converted.width,
        converted.height,
        converted.pitch,
    );
    assert_eq!((rotated.width, rotated.height), (320, 240));

    let inp = ScalerInput {
        src_w: w as i32,
        src_h: h as i32,
        src_p: (w * 2) as i32,
        rotation: Rotation::Ccw90,
        mode: ScalingMode::Native,
        device_w: 640,
        device_h: 480,
        device_p: 1280,
        ..Default::default()
    };
    let r = calculate(&inp);
    assert_eq!((r.true_w, r.true_h), (320, 240));
    assert_eq!(r.scale, 2);
    assert_eq!((r.dst_x, r.dst_y), (0, 0));

    let mut canvas = vec![0u8; (r.dst_p * r.canvas_h) as usize];
    assert!(blit(&r, &rotated, &mut canvas, Sharpness::Sharp, Effect::None));

    // The top row ends up as the left column after a counter-clockwise turn.
    assert_eq!(canvas_pixel(&canvas, r.dst_p, 0, 240), 0xFFFF);
    assert_eq!(canvas_pixel(&canvas, r.dst_p, 1, 479), 0xFFFF);
    assert_eq!(canvas_pixel(&canvas, r.dst_p, 2, 240), 0x0000);
}

#[test]
pub fn test_display_meter_locks_and_holds() {
    let mut meter = RateMeter::display();
    for i in 0..30 {
        meter.add_sample(59.90 + 0.12 * i as f64 / 29.0);
    }
    assert!(meter.is_stable());
    assert!((meter.rate() - 59.96).abs() < 0.01);
    assert!((meter.swing() - 0.12).abs() < 1e-6);

    let locked = meter.rate();
    meter.add_sample(59.82);
    assert_eq!(meter.rate(), locked);
}
