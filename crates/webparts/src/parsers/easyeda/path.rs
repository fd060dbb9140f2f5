//! Minimal SVG path reader for EasyEDA shape strings.
//!
//! Supports M/L/H/V/Z and A, absolute and relative. Curves (C/S/Q/T) are
//! replaced by a straight segment to their end point and reported through
//! `PathPoints::approximated`.
use super::Frame;
use crate::types::Vertex;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Command(char),
    Number(f64),
}

fn tokenize(path: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut num = String::new();
    let flush = |num: &mut String, tokens: &mut Vec<Token>| {
        if !num.is_empty() {
            if let Ok(v) = num.parse::<f64>() {
                tokens.push(Token::Number(v));
            }
            num.clear();
        }
    };
    for c in path.chars() {
        match c {
            'e' | 'E' if !num.is_empty() => num.push(c),
            c if c.is_ascii_alphabetic() => {
                flush(&mut num, &mut tokens);
                tokens.push(Token::Command(c));
            }
            '-' | '+' => {
                if !(num.ends_with('e') || num.ends_with('E')) {
                    flush(&mut num, &mut tokens);
                }
                num.push(c);
            }
            '.' => {
                if num.contains('.') && !num.contains(['e', 'E']) {
                    flush(&mut num, &mut tokens);
                }
                num.push(c);
            }
            c if c.is_ascii_digit() => num.push(c),
            _ => flush(&mut num, &mut tokens),
        }
    }
    flush(&mut num, &mut tokens);
    tokens
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathPoints {
    /// Vertices in target coordinates (mm, Y up).
    pub vertices: Vec<Vertex>,
    pub closed: bool,
    pub approximated: bool,
}

/// Angle in degrees of an SVG endpoint arc after the Y flip.
///
/// Returns `None` for zero-length arcs. Radii too small to span the chord are
/// scaled up as SVG requires, which yields a half circle.
pub fn arc_angle(start: [f64; 2], end: [f64; 2], radius: f64, large_arc: bool, sweep: bool) -> Option<f64> {
    let chord = ((end[0] - start[0]).powi(2) + (end[1] - start[1]).powi(2)).sqrt();
    if chord == 0.0 {
        return None;
    }
    let ratio = if radius <= 0.0 {
        1.0
    } else {
        (chord / (2.0 * radius)).min(1.0)
    };
    let mut theta = 2.0 * ratio.asin();
    if large_arc {
        theta = 2.0 * std::f64::consts::PI - theta;
    }
    // Vendor Y points down, so a positive sweep ends up clockwise.
    if sweep {
        theta = -theta;
    }
    Some(theta.to_degrees())
}

/// Parse a path whose coordinates are in vendor units.
pub fn parse_path(path: &str, frame: &Frame) -> PathPoints {
    let tokens = tokenize(path);
    let mut out = PathPoints::default();
    // Raw vendor coordinates.
    let mut cur = [0.0f64, 0.0];
    let mut start = [0.0f64, 0.0];
    let mut cmd = 'M';
    let mut i = 0;

    let nums = |i: &mut usize, n: usize| -> Option<Vec<f64>> {
        let mut v = Vec::with_capacity(n);
        for k in 0..n {
            match tokens.get(*i + k) {
                Some(Token::Number(x)) => v.push(*x),
                _ => return None,
            }
        }
        *i += n;
        Some(v)
    };

    while i < tokens.len() {
        if let Token::Command(c) = tokens[i] {
            cmd = c;
            i += 1;
            if c == 'Z' || c == 'z' {
                out.closed = true;
                cur = start;
                continue;
            }
        }
        let rel = cmd.is_ascii_lowercase();
        let base = if rel { cur } else { [0.0, 0.0] };
        match cmd.to_ascii_uppercase() {
            'M' | 'L' => {
                let Some(v) = nums(&mut i, 2) else { break };
                cur = [base[0] + v[0], base[1] + v[1]];
                if cmd.to_ascii_uppercase() == 'M' {
                    start = cur;
                    // Subsequent pairs after a moveto are linetos.
                    cmd = if rel { 'l' } else { 'L' };
                }
                out.vertices.push(Vertex::at(frame.point(cur[0], cur[1])));
            }
            'H' => {
                let Some(v) = nums(&mut i, 1) else { break };
                cur[0] = if rel { cur[0] + v[0] } else { v[0] };
                out.vertices.push(Vertex::at(frame.point(cur[0], cur[1])));
            }
            'V' => {
                let Some(v) = nums(&mut i, 1) else { break };
                cur[1] = if rel { cur[1] + v[0] } else { v[0] };
                out.vertices.push(Vertex::at(frame.point(cur[0], cur[1])));
            }
            'A' => {
                let Some(v) = nums(&mut i, 7) else { break };
                let end = [base[0] + v[5], base[1] + v[6]];
                let from = frame.point(cur[0], cur[1]);
                let to = frame.point(end[0], end[1]);
                let radius = frame.length(v[0].max(v[1]));
                if out.vertices.is_empty() {
                    out.vertices.push(Vertex::at(from));
                }
                if let (Some(angle), Some(last)) = (
                    arc_angle(from, to, radius, v[3] != 0.0, v[4] != 0.0),
                    out.vertices.last_mut(),
                ) {
                    last.angle = angle;
                }
                cur = end;
                out.vertices.push(Vertex::at(to));
            }
            'C' | 'S' | 'Q' | 'T' => {
                let n = match cmd.to_ascii_uppercase() {
                    'C' => 6,
                    'S' | 'Q' => 4,
                    _ => 2,
                };
                let Some(v) = nums(&mut i, n) else { break };
                cur = [base[0] + v[n - 2], base[1] + v[n - 1]];
                out.approximated = true;
                out.vertices.push(Vertex::at(frame.point(cur[0], cur[1])));
            }
            _ => {
                // Unknown command: skip its operands.
                i += 1;
                out.approximated = true;
            }
        }
    }

    if out.closed {
        if let (Some(first), Some(last)) = (out.vertices.first().copied(), out.vertices.last()) {
            if first.position != last.position {
                out.vertices.push(Vertex::at(first.position));
            }
        }
    }
    out
}

/// Parse a flat `x y x y ...` list in vendor units.
pub fn parse_point_list(raw: &str) -> Option<Vec<[f64; 2]>> {
    let coords: Vec<f64> = raw
        .split([' ', ','])
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if coords.len() % 2 != 0 {
        return None;
    }
    Some(coords.chunks(2).map(|c| [c[0], c[1]]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> Frame {
        Frame::new([0.0, 0.0])
    }

    #[test]
    fn test_tokenize_packed_numbers() {
        let t = tokenize("M1-2.5.5L3e1 4");
        assert_eq!(
            t,
            vec![
                Token::Command('M'),
                Token::Number(1.0),
                Token::Number(-2.5),
                Token::Number(0.5),
                Token::Command('L'),
                Token::Number(30.0),
                Token::Number(4.0),
            ]
        );
    }

    #[test]
    fn test_relative_lines_and_close() {
        let p = parse_path("M 0 0 h 10 v 10 h -10 Z", &frame());
        assert!(p.closed);
        assert_eq!(p.vertices.len(), 5);
        assert_relative_eq!(p.vertices[1].position[0], 2.54);
        // Y is inverted.
        assert_relative_eq!(p.vertices[2].position[1], -2.54);
        assert_eq!(p.vertices[4].position, p.vertices[0].position);
    }

    #[test]
    fn test_half_circle_arc() {
        let p = parse_path("M 0 0 A 5 5 0 0 1 10 0", &frame());
        assert_eq!(p.vertices.len(), 2);
        assert_relative_eq!(p.vertices[0].angle, -180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_arc_angle_large_arc() {
        let a = arc_angle([0.0, 0.0], [1.0, 1.0], 1.0, true, false).unwrap();
        assert_relative_eq!(a, 270.0, epsilon = 1e-9);
        assert!(arc_angle([1.0, 1.0], [1.0, 1.0], 1.0, false, false).is_none());
    }

    #[test]
    fn test_curve_is_approximated() {
        let p = parse_path("M 0 0 C 1 1 2 2 3 3", &frame());
        assert!(p.approximated);
        assert_eq!(p.vertices.len(), 2);
    }

    #[test]
    fn test_point_list() {
        assert_eq!(
            parse_point_list("1 2 3 4"),
            Some(vec![[1.0, 2.0], [3.0, 4.0]])
        );
        assert_eq!(parse_point_list("1 2 3"), None);
        assert_eq!(parse_point_list("1 x"), None);
    }
}
