//! Graph artifact format - everything the expansion step consumes,
//! packed into one binary file.
//!
//! Layout (little-endian):
//! - header: magic, version, reserved, node / edge / restriction /
//!   barrier / signal counts
//! - nodes: external id `u64`, lat `i32`, lon `i32` (microdegrees)
//! - directed edges: source `u32`, target `u32`, distance `u32`, name
//!   id `u32`, road class `u8`, travel mode `u8`, flags `u8`
//!   (bit 0 reversed, bit 1 roundabout, bit 2 startpoint), pad `u8`
//! - geometry, one bucket per directed edge in id order: count `u32`,
//!   then (node `u32`, weight `u32`) per segment
//! - restrictions: from `u32`, via `u32`, to `u32`, kind `u8`
//!   (0 forbidden, 1 only-turn), three pad bytes
//! - barrier node ids, then traffic-signal node ids: `u32` each
//! - footer: body CRC-64 and file CRC-64

use anyhow::{bail, Context, Result};
use crc::{Crc, CRC_64_GO_ISO};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::compressed::{CompressedEdgeContainer, SegmentEntry};
use crate::geo::QueryNode;
use crate::graph::{EdgeData, InputEdge, NodeBasedGraph, NodeId, RoadClass, RoutingGraph, TravelMode};
use crate::restrictions::RestrictionMap;

const MAGIC: u32 = 0x4E424758; // "NBGX"
const VERSION: u16 = 1;

/// Footer checksum over everything before it.
const ARTIFACT_CRC: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

const FLAG_REVERSED: u8 = 0b001;
const FLAG_ROUNDABOUT: u8 = 0b010;
const FLAG_STARTPOINT: u8 = 0b100;

/// The in-memory counterpart of a graph artifact file.
#[derive(Debug)]
pub struct GraphArtifact {
    pub query_nodes: Vec<QueryNode>,
    pub graph: NodeBasedGraph,
    pub geometry: CompressedEdgeContainer,
    pub restrictions: RestrictionMap,
    pub barrier_nodes: FxHashSet<NodeId>,
    pub traffic_signals: FxHashSet<NodeId>,
}

pub struct GraphFile;

impl GraphFile {
    pub fn write<P: AsRef<Path>>(path: P, artifact: &GraphArtifact) -> Result<()> {
        let graph = &artifact.graph;
        let n_nodes = graph.num_nodes();
        let n_edges = graph.num_edges();

        let mut restriction_rows: Vec<(NodeId, NodeId, NodeId, u8)> = artifact
            .restrictions
            .iter_forbidden()
            .map(|(from, via, to)| (from, via, to, 0u8))
            .chain(
                artifact
                    .restrictions
                    .iter_only_turns()
                    .map(|(from, via, to)| (from, via, to, 1u8)),
            )
            .collect();
        restriction_rows.sort_unstable();

        let mut barriers: Vec<NodeId> = artifact.barrier_nodes.iter().copied().collect();
        barriers.sort_unstable();
        let mut signals: Vec<NodeId> = artifact.traffic_signals.iter().copied().collect();
        signals.sort_unstable();

        // serialize header and body, checksum the lot, then write out
        let mut body = Vec::new();
        body.extend_from_slice(&MAGIC.to_le_bytes());
        body.extend_from_slice(&VERSION.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&n_nodes.to_le_bytes());
        body.extend_from_slice(&n_edges.to_le_bytes());
        body.extend_from_slice(&(restriction_rows.len() as u32).to_le_bytes());
        body.extend_from_slice(&(barriers.len() as u32).to_le_bytes());
        body.extend_from_slice(&(signals.len() as u32).to_le_bytes());

        for node in &artifact.query_nodes {
            body.extend_from_slice(&node.node_id.to_le_bytes());
            body.extend_from_slice(&node.lat.to_le_bytes());
            body.extend_from_slice(&node.lon.to_le_bytes());
        }

        // directed edges in id order
        for source in 0..n_nodes {
            for edge in graph.adjacent_edges(source) {
                let data = graph.edge_data(edge);
                let mut flags = 0u8;
                if data.reversed {
                    flags |= FLAG_REVERSED;
                }
                if data.roundabout {
                    flags |= FLAG_ROUNDABOUT;
                }
                if data.startpoint {
                    flags |= FLAG_STARTPOINT;
                }
                body.extend_from_slice(&source.to_le_bytes());
                body.extend_from_slice(&graph.target(edge).to_le_bytes());
                body.extend_from_slice(&data.distance.to_le_bytes());
                body.extend_from_slice(&data.name_id.to_le_bytes());
                body.extend_from_slice(&[data.road_class as u8, data.travel_mode as u8, flags, 0]);
            }
        }

        // geometry buckets in edge-id order
        for edge in 0..n_edges {
            let bucket = artifact.geometry.bucket(edge);
            body.extend_from_slice(&(bucket.len() as u32).to_le_bytes());
            for entry in bucket {
                body.extend_from_slice(&entry.node_id.to_le_bytes());
                body.extend_from_slice(&entry.weight.to_le_bytes());
            }
        }

        for (from, via, to, kind) in &restriction_rows {
            body.extend_from_slice(&from.to_le_bytes());
            body.extend_from_slice(&via.to_le_bytes());
            body.extend_from_slice(&to.to_le_bytes());
            body.extend_from_slice(&[*kind, 0, 0, 0]);
        }

        for node in barriers.iter().chain(signals.iter()) {
            body.extend_from_slice(&node.to_le_bytes());
        }

        let body_crc = ARTIFACT_CRC.checksum(&body);
        let file_crc = body_crc;

        let file = File::create(&path)
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&body)?;
        writer.write_all(&body_crc.to_le_bytes())?;
        writer.write_all(&file_crc.to_le_bytes())?;
        writer.flush()?;

        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<GraphArtifact> {
        let file = File::open(&path)
            .with_context(|| format!("opening {}", path.as_ref().display()))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; 28];
        reader.read_exact(&mut header)?;
        let magic = u32::from_le_bytes(header[0..4].try_into()?);
        if magic != MAGIC {
            bail!("not a graph artifact: bad magic {magic:#010x}");
        }
        let version = u16::from_le_bytes(header[4..6].try_into()?);
        if version != VERSION {
            bail!("unsupported graph artifact version {version}");
        }
        let n_nodes = u32::from_le_bytes(header[8..12].try_into()?);
        let n_edges = u32::from_le_bytes(header[12..16].try_into()?);
        let n_restrictions = u32::from_le_bytes(header[16..20].try_into()?);
        let n_barriers = u32::from_le_bytes(header[20..24].try_into()?);
        let n_signals = u32::from_le_bytes(header[24..28].try_into()?);

        let mut query_nodes = Vec::with_capacity(n_nodes as usize);
        for _ in 0..n_nodes {
            let mut record = [0u8; 16];
            reader.read_exact(&mut record)?;
            query_nodes.push(QueryNode {
                node_id: u64::from_le_bytes(record[0..8].try_into()?),
                lat: i32::from_le_bytes(record[8..12].try_into()?),
                lon: i32::from_le_bytes(record[12..16].try_into()?),
            });
        }

        let mut edges = Vec::with_capacity(n_edges as usize);
        for _ in 0..n_edges {
            let mut record = [0u8; 20];
            reader.read_exact(&mut record)?;
            let flags = record[18];
            edges.push(InputEdge {
                source: u32::from_le_bytes(record[0..4].try_into()?),
                target: u32::from_le_bytes(record[4..8].try_into()?),
                data: EdgeData {
                    distance: u32::from_le_bytes(record[8..12].try_into()?),
                    name_id: u32::from_le_bytes(record[12..16].try_into()?),
                    road_class: RoadClass::from(record[16]),
                    travel_mode: TravelMode::from(record[17]),
                    reversed: flags & FLAG_REVERSED != 0,
                    roundabout: flags & FLAG_ROUNDABOUT != 0,
                    startpoint: flags & FLAG_STARTPOINT != 0,
                    ..EdgeData::default()
                },
            });
        }

        let mut geometry = CompressedEdgeContainer::new();
        for edge in 0..n_edges {
            let mut count_bytes = [0u8; 4];
            reader.read_exact(&mut count_bytes)?;
            let count = u32::from_le_bytes(count_bytes);
            if count == 0 {
                bail!("edge {edge} has empty geometry");
            }
            let mut bucket = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut record = [0u8; 8];
                reader.read_exact(&mut record)?;
                bucket.push(SegmentEntry {
                    node_id: u32::from_le_bytes(record[0..4].try_into()?),
                    weight: u32::from_le_bytes(record[4..8].try_into()?),
                });
            }
            geometry.insert(edge, bucket);
        }

        let mut restrictions = RestrictionMap::new();
        for _ in 0..n_restrictions {
            let mut record = [0u8; 16];
            reader.read_exact(&mut record)?;
            let from = u32::from_le_bytes(record[0..4].try_into()?);
            let via = u32::from_le_bytes(record[4..8].try_into()?);
            let to = u32::from_le_bytes(record[8..12].try_into()?);
            match record[12] {
                1 => restrictions.add_only_turn(from, via, to),
                _ => restrictions.add_restriction(from, via, to),
            }
        }

        let mut barrier_nodes = FxHashSet::default();
        for _ in 0..n_barriers {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            barrier_nodes.insert(u32::from_le_bytes(bytes));
        }
        let mut traffic_signals = FxHashSet::default();
        for _ in 0..n_signals {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            traffic_signals.insert(u32::from_le_bytes(bytes));
        }

        Ok(GraphArtifact {
            query_nodes,
            graph: NodeBasedGraph::from_edges(n_nodes, edges),
            geometry,
            restrictions,
            barrier_nodes,
            traffic_signals,
        })
    }
}
