use super::*;

#[test]
fn test_clear_color_default_is_transparent_black() {
    assert_eq!(ClearColor::default(), ClearColor([0.0; 4]));
}

#[test]
fn test_clear_color_from_rgba8() {
    let color = ClearColor::from_rgba8(255, 0, 51, 255);
    assert_eq!(color.0, [1.0, 0.0, 0.2, 1.0]);
}
