use super::AudioBuffer;

fn tone(frames: usize, value: f32) -> AudioBuffer {
    AudioBuffer::new(vec![value; frames], 1, 1000)
}

#[test]
fn silence_has_requested_length_and_is_silent() {
    let buf = AudioBuffer::silence(1500, 2, 1000);
    assert_eq!(buf.len_ms(), 1500);
    assert!(buf.samples().iter().all(|&s| s == 0.0));
}

#[test]
fn slice_ms_cuts_the_requested_window() {
    // 1 kHz mono: one frame per millisecond.
    let buf = AudioBuffer::new((0..1000).map(|i| i as f32).collect(), 1, 1000);
    let cut = buf.slice_ms(100, 300);
    assert_eq!(cut.len_ms(), 200);
    assert_eq!(cut.samples()[0], 100.0);
    assert_eq!(*cut.samples().last().unwrap(), 299.0);
}

#[test]
fn slice_ms_clamps_out_of_range_bounds() {
    let buf = tone(1000, 0.5);
    assert_eq!(buf.slice_ms(800, 5000).len_ms(), 200);
    assert_eq!(buf.slice_ms(5000, 9000).len_ms(), 0);
    assert_eq!(buf.slice_ms(300, 100).len_ms(), 0);
}

#[test]
fn fades_taper_the_edges_only() {
    let mut buf = tone(1000, 1.0);
    buf.fade_in(200);
    buf.fade_out(200);
    assert_eq!(buf.samples()[0], 0.0);
    assert!(buf.samples()[100] < 1.0);
    assert_eq!(buf.samples()[500], 1.0);
    assert!(*buf.samples().last().unwrap() < 0.01);
}

#[test]
fn normalize_scales_peak_close_to_full_scale() {
    let mut buf = AudioBuffer::new(vec![0.1, -0.25, 0.2], 1, 1000);
    buf.normalize();
    let peak = buf.samples().iter().fold(0.0f32, |p, s| p.max(s.abs()));
    assert!((peak - 0.9886).abs() < 1e-3);
}

#[test]
fn normalize_leaves_silence_alone() {
    let mut buf = AudioBuffer::silence(100, 1, 1000);
    buf.normalize();
    assert!(buf.samples().iter().all(|&s| s == 0.0));
}

#[test]
fn append_concatenates_lengths() {
    let mut a = tone(1000, 0.2);
    let b = tone(500, 0.4);
    a.append(&b);
    assert_eq!(a.len_ms(), 1500);
}

#[test]
fn append_conforms_mismatched_formats() {
    let mut a = tone(1000, 0.2); // mono @ 1 kHz
    let b = AudioBuffer::new(vec![0.4; 4000], 2, 2000); // stereo @ 2 kHz, 1 s
    a.append(&b);
    assert_eq!(a.channels(), 1);
    assert_eq!(a.sample_rate(), 1000);
    assert_eq!(a.len_ms(), 2000);
}

#[test]
fn overlay_mixes_and_keeps_longer_length() {
    let a = tone(1000, 0.25);
    let b = tone(400, 0.5);
    let mixed = a.overlay(&b);
    assert_eq!(mixed.len_ms(), 1000);
    assert!((mixed.samples()[0] - 0.75).abs() < 1e-6);
    assert!((mixed.samples()[900] - 0.25).abs() < 1e-6);
}

#[test]
fn pad_to_ms_extends_with_silence_but_never_truncates() {
    let mut buf = tone(500, 0.5);
    buf.pad_to_ms(800);
    assert_eq!(buf.len_ms(), 800);
    assert_eq!(*buf.samples().last().unwrap(), 0.0);

    buf.pad_to_ms(100);
    assert_eq!(buf.len_ms(), 800);
}

#[test]
fn silence_plus_concat_matches_composed_track_shape() {
    // Music channel shape: lead-in silence followed by two blocks.
    let mut track = AudioBuffer::silence(1000, 1, 1000);
    track.append(&tone(2000, 0.5));
    track.append(&tone(2000, 0.5));
    assert_eq!(track.len_ms(), 5000);
    assert_eq!(track.samples()[500], 0.0);
    assert_eq!(track.samples()[1500], 0.5);
}
