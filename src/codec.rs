//! Text persistence for genomes and tracks.
//!
//! ## Genome format
//!
//! ```text
//! I0, I1, I2
//! H5
//! O3, O4
//! 0:	I0->0.5+0.0->O3
//! 1:	I1->-1.25+0.1->O3	disabled
//! ```
//!
//! Three header lines list input, hidden and output nodes, each a kind tag
//! followed by the id in hex. Nodes keep the order they were declared in. Every further line is one connection:
//! `lineage:\tsource->weight+bias->target`, with a trailing `\tdisabled` when
//! the gene does not transmit. Floats use Rust's shortest round-trip format,
//! which never emits a `+`, so the weight/bias split is unambiguous.
//!
//! ## Track format
//!
//! One boundary per line: `(x1, y1)->(x2, y2)`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{DecodeError, Error, Result};
use crate::gene::{ConnectionSpec, NodeKind, NodeRef};
use crate::genome::{Genome, NeatConfig};
use crate::geometry::{Point, Segment};
use crate::innovation::Sequences;
use crate::track::Track;

const DISABLED_MARKER: &str = "disabled";

/// Header line order.
const HEADERS: [NodeKind; 3] = [NodeKind::Input, NodeKind::Hidden, NodeKind::Output];

/// Serialize a genome to the text format.
#[must_use]
pub fn encode_genome(genome: &Genome) -> String {
    let mut out = String::new();
    for ids in [
        genome.input_ids.clone(),
        genome
            .nodes
            .iter()
            .filter(|(_, node)| node.kind == NodeKind::Hidden)
            .map(|(key, _)| key)
            .collect(),
        genome.output_ids.clone(),
    ] {
        let line: Vec<String> = ids
            .iter()
            .map(|&id| genome.nodes[id].node_ref().to_string())
            .collect();
        out.push_str(&line.join(", "));
        out.push('\n');
    }

    for conn in genome.connections.values() {
        let spec = genome.connection_spec(conn);
        let _ = write!(
            out,
            "{}:\t{}->{:?}+{:?}->{}",
            spec.lineage, spec.source, spec.weight, spec.bias, spec.target
        );
        if !spec.enabled {
            out.push('\t');
            out.push_str(DISABLED_MARKER);
        }
        out.push('\n');
    }

    out
}

/// Parse a genome from the text format.
///
/// `seq` is advanced past every node id and lineage number in the text.
///
/// # Errors
///
/// A [`DecodeError`] naming the first offending line.
pub fn decode_genome(text: &str, seq: &Sequences) -> std::result::Result<Genome, DecodeError> {
    let mut lines = text.lines().enumerate();
    let mut headers: Vec<Vec<NodeRef>> = Vec::with_capacity(3);

    for (n, kind) in HEADERS.into_iter().enumerate() {
        let (idx, line) = lines.next().ok_or(DecodeError::MissingHeader(n + 1))?;
        headers.push(parse_header(line, kind, idx + 1)?);
    }

    let config = NeatConfig::minimal(headers[0].len(), headers[2].len());
    let mut genome = Genome::empty(config);
    for node in headers.into_iter().flatten() {
        genome.put_node(node);
    }

    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        genome.put_connection(parse_connection(line, idx + 1)?);
    }

    let (node, lineage) = genome.max_ids();
    seq.observe(node, lineage);
    Ok(genome)
}

fn parse_header(line: &str, kind: NodeKind, line_no: usize) -> std::result::Result<Vec<NodeRef>, DecodeError> {
    line.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let node = parse_node(token, line_no)?;
            if node.kind == kind {
                Ok(node)
            } else {
                Err(DecodeError::MisplacedNode {
                    line: line_no,
                    text: token.to_string(),
                })
            }
        })
        .collect()
}

fn parse_node(token: &str, line_no: usize) -> std::result::Result<NodeRef, DecodeError> {
    let malformed = || DecodeError::MalformedNode {
        line: line_no,
        text: token.to_string(),
    };
    let mut chars = token.chars();
    let kind = chars.next().and_then(NodeKind::from_tag).ok_or_else(malformed)?;
    let id = u64::from_str_radix(chars.as_str(), 16).map_err(|_| malformed())?;
    Ok(NodeRef::new(kind, id))
}

fn parse_connection(line: &str, line_no: usize) -> std::result::Result<ConnectionSpec, DecodeError> {
    let malformed = || DecodeError::MalformedConnection {
        line: line_no,
        text: line.to_string(),
    };

    let (lineage, rest) = line.split_once(':').ok_or_else(malformed)?;
    let lineage: u64 = lineage.trim().parse().map_err(|_| malformed())?;

    let mut parts = rest.trim_start().split("->");
    let (Some(source), Some(params), Some(tail), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let (target, enabled) = match tail.split_once('\t') {
        Some((target, marker)) if marker.trim() == DISABLED_MARKER => (target, false),
        Some(_) => return Err(malformed()),
        None => (tail, true),
    };

    let (weight, bias) = params.split_once('+').ok_or_else(malformed)?;
    let weight: f64 = weight.trim().parse().map_err(|_| malformed())?;
    let bias: f64 = bias.trim().parse().map_err(|_| malformed())?;

    let source = parse_node(source.trim(), line_no)?;
    let target = parse_node(target.trim(), line_no)?;
    if source.kind == NodeKind::Output || target.kind == NodeKind::Input {
        return Err(DecodeError::MisdirectedEdge {
            line: line_no,
            text: line.to_string(),
        });
    }

    let spec = ConnectionSpec::new(lineage, source, target, weight, bias);
    Ok(if enabled { spec } else { spec.disabled() })
}

/// Serialize a track, one boundary per line.
#[must_use]
pub fn encode_track(track: &Track) -> String {
    let mut out = String::new();
    for edge in track.edges() {
        let _ = writeln!(
            out,
            "({:?}, {:?})->({:?}, {:?})",
            edge.start.x, edge.start.y, edge.end.x, edge.end.y
        );
    }
    out
}

/// Parse a track. Blank lines are ignored.
///
/// # Errors
///
/// [`DecodeError::MalformedEdge`] naming the first offending line.
pub fn decode_track(text: &str) -> std::result::Result<Track, DecodeError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_edge(line).ok_or_else(|| DecodeError::MalformedEdge {
                line: idx + 1,
                text: line.to_string(),
            })
        })
        .collect()
}

fn parse_edge(line: &str) -> Option<Segment> {
    let (start, end) = line.trim().split_once("->")?;
    Some(Segment::new(parse_point(start)?, parse_point(end)?))
}

fn parse_point(text: &str) -> Option<Point> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = inner.split_once(',')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Write a genome file.
///
/// # Errors
///
/// [`Error::Io`] if the file cannot be written.
pub fn write_genome(path: impl AsRef<Path>, genome: &Genome) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, encode_genome(genome)).map_err(|e| Error::io(path, e))
}

/// Read a genome file, advancing `seq` past its ids.
///
/// # Errors
///
/// [`Error::Io`] if the file cannot be read, [`Error::Decode`] if it does not parse.
pub fn read_genome(path: impl AsRef<Path>, seq: &Sequences) -> Result<Genome> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(decode_genome(&text, seq)?)
}

/// Read a track file.
///
/// # Errors
///
/// [`Error::Io`] if the file cannot be read, [`Error::Decode`] if it does not parse.
pub fn read_track(path: impl AsRef<Path>) -> Result<Track> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(decode_track(&text)?)
}

/// Genomes decoded from a directory, plus the files that were skipped.
#[derive(Debug, Default)]
pub struct LoadedPopulation {
    /// Successfully decoded genomes, in path order.
    pub genomes: Vec<Genome>,
    /// Files that failed to decode.
    pub skipped: Vec<(PathBuf, DecodeError)>,
}

/// Decode every regular file in `dir` as a genome.
///
/// Files that fail to decode are logged and skipped; the rest still load.
///
/// # Errors
///
/// [`Error::Io`] if the directory or one of its files cannot be read.
pub fn load_population_dir(dir: impl AsRef<Path>, seq: &Sequences) -> Result<LoadedPopulation> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut loaded = LoadedPopulation::default();
    for path in paths {
        let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        match decode_genome(&text, seq) {
            Ok(genome) => loaded.genomes.push(genome),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed genome");
                loaded.skipped.push((path, err));
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "I0, I1\nH3\nO2\n\
                          0:\tI0->0.5+0.0->O2\n\
                          1:\tI1->-1.25+0.1->O2\n\
                          2:\tI0->0.5+0.0->H3\tdisabled\n\
                          3:\tH3->1.0+0.0->O2\n";

    #[test]
    fn test_decode_sample() {
        let seq = Sequences::new();
        let genome = decode_genome(SAMPLE, &seq).unwrap();

        assert_eq!(genome.input_ids.len(), 2);
        assert_eq!(genome.output_ids.len(), 1);
        assert_eq!(genome.hidden_ids.len(), 1);
        assert_eq!(genome.connections.len(), 4);
        assert!(!genome.connections[&2].enabled);
        assert_eq!(genome.connections[&1].weight, -1.25);
        assert_eq!(genome.connections[&1].bias, 0.1);
        assert_eq!(seq.peek_node_id(), 4);
        assert_eq!(seq.peek_lineage(), 4);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let genome = decode_genome(SAMPLE, &Sequences::new()).unwrap();
        assert_eq!(encode_genome(&genome), SAMPLE);
    }

    #[test]
    fn test_hidden_nodes_keep_declared_order() {
        let text = "I0\nH5, H3\nO1\n\
                    0:\tI0->1.0+0.0->H5\n\
                    1:\tH5->1.0+0.0->O1\n\
                    2:\tI0->1.0+0.0->H3\n\
                    3:\tH3->1.0+0.0->O1\n";
        let genome = decode_genome(text, &Sequences::new()).unwrap();
        assert_eq!(encode_genome(&genome), text);
    }

    #[test]
    fn test_hex_ids() {
        let text = "Ia\n\nOff\n10:\tIa->2.0+0.0->Off\n";
        let genome = decode_genome(text, &Sequences::new()).unwrap();
        let conn = &genome.connections[&10];
        assert_eq!(genome.nodes[conn.source].id, 10);
        assert_eq!(genome.nodes[conn.target].id, 255);
        assert_eq!(encode_genome(&genome), text);
    }

    #[test]
    fn test_trailing_separator_is_tolerated() {
        let text = "I0, I1, \n\nO2, \n";
        let genome = decode_genome(text, &Sequences::new()).unwrap();
        assert_eq!(genome.input_ids.len(), 2);
        assert_eq!(genome.output_ids.len(), 1);
    }

    #[test]
    fn test_decode_errors() {
        let seq = Sequences::new();
        assert_eq!(
            decode_genome("I0\n", &seq).unwrap_err(),
            DecodeError::MissingHeader(2)
        );
        assert!(matches!(
            decode_genome("I0, O1\n\nO2\n", &seq).unwrap_err(),
            DecodeError::MisplacedNode { line: 1, .. }
        ));
        assert!(matches!(
            decode_genome("Ix\n\nO2\n", &seq).unwrap_err(),
            DecodeError::MalformedNode { line: 1, .. }
        ));
        assert!(matches!(
            decode_genome("I0\n\nO1\n0:\tI0->0.5->O1\n", &seq).unwrap_err(),
            DecodeError::MalformedConnection { line: 4, .. }
        ));
        assert!(matches!(
            decode_genome("I0\n\nO1\n0:\tI0->0.5+0.0->O1\tbogus\n", &seq).unwrap_err(),
            DecodeError::MalformedConnection { line: 4, .. }
        ));
    }

    #[test]
    fn test_edges_respect_node_roles() {
        let seq = Sequences::new();
        assert!(matches!(
            decode_genome("I1\n\nO2\n0:\tO2->1.0+5.0->I1\n", &seq).unwrap_err(),
            DecodeError::MisdirectedEdge { line: 4, .. }
        ));
        assert!(matches!(
            decode_genome("I1\nH3\nO2\n0:\tI1->1.0+0.0->O2\n1:\tH3->1.0+0.0->I1\n", &seq).unwrap_err(),
            DecodeError::MisdirectedEdge { line: 5, .. }
        ));
        assert!(matches!(
            decode_genome("I1\n\nO2, O3\n0:\tO2->1.0+0.0->O3\n", &seq).unwrap_err(),
            DecodeError::MisdirectedEdge { line: 4, .. }
        ));
    }

    #[test]
    fn test_track_round_trip() {
        let text = "(100.0, -10.0)->(100.0, 10.0)\n(0.0, 0.5)->(-3.25, 7.0)\n";
        let track = decode_track(text).unwrap();
        assert_eq!(track.edges().len(), 2);
        assert_eq!(track.edges()[1].end, Point::new(-3.25, 7.0));
        assert_eq!(encode_track(&track), text);
    }

    #[test]
    fn test_track_accepts_integers_and_blank_lines() {
        let track = decode_track("(1, 2)->(3, 4)\n\n").unwrap();
        assert_eq!(track.edges()[0].start, Point::new(1.0, 2.0));
    }

    #[test]
    fn test_track_error_names_line() {
        let err = decode_track("(1, 2)->(3, 4)\n(1, 2)-(3, 4)\n").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEdge { line: 2, .. }));
    }
}
