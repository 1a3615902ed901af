// pxbi-parsers/src/pxbi/bones.rs
//! Bone and joint records, and the skeleton built from them

use std::collections::HashMap;
use std::io::{Read, Seek};

use byteorder::BigEndian;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::header::ContainerHeader;
use crate::cursor::ByteCursor;
use crate::traits::{Decodable, ParseError, ParseResult};

/// Row-major 4x4 matrix
pub type Matrix4 = [[f32; 4]; 4];

/// The four words at the start of the bone block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneBlockHeader {
    pub skeleton_name_pointer: u32,
    pub bone_count: u32,
    /// Declared four bytes past the start of the bone table
    pub bone_table_pointer: u32,
    pub joint_count: u32,
}

impl BoneBlockHeader {
    /// Absolute offset the bone table actually starts at
    pub fn bone_table_offset(&self) -> u64 {
        ContainerHeader::absolute(self.bone_table_pointer) - 4
    }
}

impl Decodable for BoneBlockHeader {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        Ok(Self {
            skeleton_name_pointer: cursor.read_u32::<BigEndian>()?,
            bone_count: cursor.read_u32::<BigEndian>()?,
            bone_table_pointer: cursor.read_u32::<BigEndian>()?,
            joint_count: cursor.read_u32::<BigEndian>()?,
        })
    }
}

/// 72-byte bone record: name, joint id and bind transform
#[derive(Debug, Clone, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    pub joint_id: u32,
    pub transform: Matrix4,
}

impl Decodable for BoneRecord {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let name_pointer = cursor.read_u32::<BigEndian>()?;
        let joint_id = cursor.read_u32::<BigEndian>()?;
        let flat = cursor.read_f32_fixed::<BigEndian, 16>()?;

        let mut transform = [[0.0; 4]; 4];
        for (row, chunk) in transform.iter_mut().zip(flat.chunks_exact(4)) {
            row.copy_from_slice(chunk);
        }

        let name = if name_pointer == 0 {
            String::new()
        } else {
            cursor.read_cstring_at(ContainerHeader::absolute(name_pointer))?
        };

        Ok(Self {
            name,
            joint_id,
            transform,
        })
    }
}

/// 64-byte joint record
///
/// Ten i16 values, two u32 values and nine floats. `values[3]` is the parent
/// joint and `words[0]` points at the joint's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointRecord {
    pub name: String,
    pub values: [i16; 10],
    pub words: [u32; 2],
    pub floats: [f32; 9],
}

impl JointRecord {
    /// Parent joint id (negative when the joint has none)
    pub fn parent_joint(&self) -> i16 {
        self.values[3]
    }
}

impl Decodable for JointRecord {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let mut values = [0i16; 10];
        values.copy_from_slice(&cursor.read_i16_array::<BigEndian>(10)?);
        let words = [cursor.read_u32::<BigEndian>()?, cursor.read_u32::<BigEndian>()?];
        let floats = cursor.read_f32_fixed::<BigEndian, 9>()?;
        let name = cursor.read_cstring_at(ContainerHeader::absolute(words[0]))?;

        Ok(Self {
            name,
            values,
            words,
            floats,
        })
    }
}

/// Skeleton assembled from the flat bone and joint tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skeleton {
    /// All bones in file order
    pub bones: Vec<Bone>,
    /// Bone name to index mapping
    pub bone_map: HashMap<String, usize>,
    /// Bones whose parent is the synthetic root
    pub root_bones: Vec<usize>,
}

impl Skeleton {
    /// Build the hierarchy and inverse bind poses
    ///
    /// Bone 0 is renamed to `root_name`. A bone's parent is found through
    /// its joint record's parent-joint id; a bone whose joint id or parent
    /// joint does not resolve hangs off the synthetic root.
    pub fn build(records: Vec<BoneRecord>, joints: &[JointRecord], root_name: &str) -> ParseResult<Self> {
        let mut joint_to_bone = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            joint_to_bone.insert(record.joint_id, index);
        }

        let parents: Vec<Option<usize>> = records
            .iter()
            .map(|record| {
                let joint = joints.get(record.joint_id as usize)?;
                let parent_joint = u32::try_from(joint.parent_joint()).ok()?;
                joint_to_bone.get(&parent_joint).copied()
            })
            .collect();

        let names: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                if index == 0 {
                    root_name.to_string()
                } else {
                    record.name.clone()
                }
            })
            .collect();

        detect_cycles(&parents, &names)?;

        let mut children = vec![Vec::new(); records.len()];
        for (index, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                children[*parent].push(index);
            }
        }

        let mut skeleton = Skeleton::default();
        for (((record, name), parent), children) in records
            .into_iter()
            .zip(names)
            .zip(parents)
            .zip(children)
        {
            let inverse_bind_pose = invert_matrix(&record.transform)
                .ok_or_else(|| ParseError::SingularBoneMatrix { bone: name.clone() })?;

            skeleton.add_bone(Bone {
                name,
                joint_id: record.joint_id,
                parent_index: parent,
                children,
                transform: record.transform,
                inverse_bind_pose,
            });
        }

        debug!(
            bones = skeleton.bones.len(),
            roots = skeleton.root_bones.len(),
            "Skeleton assembled"
        );
        Ok(skeleton)
    }

    fn add_bone(&mut self, bone: Bone) -> usize {
        let idx = self.bones.len();
        self.bone_map.insert(bone.name.clone(), idx);

        if bone.parent_index.is_none() {
            self.root_bones.push(idx);
        }

        self.bones.push(bone);
        idx
    }

    /// Get bone count
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Find bone by name
    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        self.bone_map.get(name).map(|&idx| &self.bones[idx])
    }

    /// Get children of a bone
    pub fn children(&self, bone_index: usize) -> &[usize] {
        self.bones
            .get(bone_index)
            .map(|bone| bone.children.as_slice())
            .unwrap_or_default()
    }

    /// Get bone chain from a bone to root
    pub fn bone_chain_to_root(&self, bone_index: usize) -> Vec<usize> {
        let mut chain = vec![bone_index];
        let mut current = bone_index;

        while let Some(parent) = self.bones.get(current).and_then(|b| b.parent_index) {
            if chain.len() > self.bones.len() {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        chain
    }

    /// Get all bone names
    pub fn bone_names(&self) -> Vec<&str> {
        self.bones.iter().map(|b| b.name.as_str()).collect()
    }
}

/// A bone after hierarchy assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub joint_id: u32,
    /// Parent bone index (None for children of the synthetic root)
    pub parent_index: Option<usize>,
    pub children: Vec<usize>,
    /// Bind transform as stored in the file
    pub transform: Matrix4,
    pub inverse_bind_pose: Matrix4,
}

impl Bone {
    /// Check if this is a root bone
    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }
}

/// Fail if following parents from any bone revisits a bone
fn detect_cycles(parents: &[Option<usize>], names: &[String]) -> ParseResult<()> {
    // 0 = unvisited, 1 = on the current walk, 2 = known to reach the root
    let mut state = vec![0u8; parents.len()];

    for start in 0..parents.len() {
        let mut walk = Vec::new();
        let mut current = Some(start);

        while let Some(index) = current {
            match state[index] {
                2 => break,
                1 => {
                    return Err(ParseError::SkeletonCycleDetected {
                        bone: names[index].clone(),
                    })
                }
                _ => {
                    state[index] = 1;
                    walk.push(index);
                    current = parents[index];
                }
            }
        }

        for index in walk {
            state[index] = 2;
        }
    }

    Ok(())
}

// Matrix utilities

/// Identity matrix
pub const IDENTITY_MATRIX: Matrix4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

const PIVOT_EPSILON: f64 = 1e-10;

/// Multiply two 4x4 matrices
pub fn multiply_matrices(a: &Matrix4, b: &Matrix4) -> Matrix4 {
    let mut result = [[0.0f32; 4]; 4];

    for (i, row) in result.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j] + a[i][3] * b[3][j];
        }
    }

    result
}

/// Invert a general 4x4 matrix
///
/// Gauss-Jordan elimination with partial pivoting, carried out in f64.
/// Returns `None` when a pivot is numerically zero.
pub fn invert_matrix(m: &Matrix4) -> Option<Matrix4> {
    let mut augmented = [[0.0f64; 8]; 4];
    for (i, row) in augmented.iter_mut().enumerate() {
        for j in 0..4 {
            row[j] = f64::from(m[i][j]);
        }
        row[4 + i] = 1.0;
    }

    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&x, &y| {
            augmented[x][col].abs().total_cmp(&augmented[y][col].abs())
        })?;
        if augmented[pivot_row][col].abs() < PIVOT_EPSILON {
            return None;
        }
        augmented.swap(col, pivot_row);

        let pivot = augmented[col][col];
        for value in &mut augmented[col] {
            *value /= pivot;
        }

        let pivot_values = augmented[col];
        for (row_index, row) in augmented.iter_mut().enumerate() {
            if row_index == col {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                for (value, pivot_value) in row.iter_mut().zip(pivot_values) {
                    *value -= factor * pivot_value;
                }
            }
        }
    }

    let mut result = [[0.0f32; 4]; 4];
    for (i, row) in result.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = augmented[i][4 + j] as f32;
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str, joint_id: u32) -> BoneRecord {
        BoneRecord {
            name: name.to_string(),
            joint_id,
            transform: IDENTITY_MATRIX,
        }
    }

    fn joint(parent: i16) -> JointRecord {
        let mut values = [0i16; 10];
        values[3] = parent;
        JointRecord {
            name: String::new(),
            values,
            words: [0, 0],
            floats: [0.0; 9],
        }
    }

    fn assert_identity(m: &Matrix4, tolerance: f32) {
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (m[i][j] - expected).abs() < tolerance,
                    "element [{i}][{j}] = {}",
                    m[i][j]
                );
            }
        }
    }

    #[test]
    fn test_build_hierarchy() {
        let records = vec![bone("", 0), bone("spine", 1), bone("head", 2), bone("arm", 3)];
        let joints = vec![joint(-1), joint(0), joint(1), joint(1)];

        let skeleton = Skeleton::build(records, &joints, "root").unwrap();

        assert_eq!(skeleton.bone_count(), 4);
        assert_eq!(skeleton.bones[0].name, "root");
        assert_eq!(skeleton.root_bones, vec![0]);
        assert_eq!(skeleton.children(0), &[1]);
        assert_eq!(skeleton.children(1), &[2, 3]);
        assert_eq!(skeleton.bone_chain_to_root(3), vec![3, 1, 0]);
        assert_eq!(skeleton.find_bone("head").map(|b| b.parent_index), Some(Some(1)));
    }

    #[test]
    fn test_unresolved_parent_goes_to_root() {
        // Bone 1 uses joint 7, which has no record; bone 2's parent joint 9 maps to no bone
        let records = vec![bone("a", 0), bone("b", 7), bone("c", 1)];
        let joints = vec![joint(-1), joint(9)];

        let skeleton = Skeleton::build(records, &joints, "root").unwrap();
        assert_eq!(skeleton.root_bones, vec![0, 1, 2]);
    }

    #[test]
    fn test_later_bone_wins_joint_mapping() {
        let records = vec![bone("a", 0), bone("b", 0), bone("c", 1)];
        let joints = vec![joint(-1), joint(0)];

        let skeleton = Skeleton::build(records, &joints, "root").unwrap();
        assert_eq!(skeleton.bones[2].parent_index, Some(1));
    }

    #[test]
    fn test_self_parent_is_cycle() {
        let records = vec![bone("a", 0), bone("b", 1)];
        let joints = vec![joint(-1), joint(1)];

        match Skeleton::build(records, &joints, "root") {
            Err(ParseError::SkeletonCycleDetected { bone }) => assert_eq!(bone, "b"),
            other => panic!("Expected SkeletonCycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_two_bone_cycle() {
        let records = vec![bone("a", 0), bone("b", 1), bone("c", 2)];
        let joints = vec![joint(-1), joint(2), joint(1)];

        assert!(matches!(
            Skeleton::build(records, &joints, "root"),
            Err(ParseError::SkeletonCycleDetected { .. })
        ));
    }

    #[test]
    fn test_singular_matrix() {
        let mut records = vec![bone("", 0), bone("flat", 1)];
        records[1].transform[2] = [0.0; 4];
        let joints = vec![joint(-1), joint(0)];

        match Skeleton::build(records, &joints, "root") {
            Err(ParseError::SingularBoneMatrix { bone }) => assert_eq!(bone, "flat"),
            other => panic!("Expected SingularBoneMatrix, got {other:?}"),
        }
    }

    #[test]
    fn test_identity_matrix_multiply() {
        let result = multiply_matrices(&IDENTITY_MATRIX, &IDENTITY_MATRIX);
        assert_identity(&result, 0.001);
    }

    #[test]
    fn test_invert_general_matrix() {
        let m: Matrix4 = [
            [0.0, 2.0, 0.0, 1.0],
            [1.0, 0.0, 0.5, 0.0],
            [0.0, 0.0, 3.0, -2.0],
            [4.0, 1.0, 0.0, 1.0],
        ];
        let inverse = invert_matrix(&m).unwrap();
        assert_identity(&multiply_matrices(&inverse, &m), 1e-5);
        assert_identity(&multiply_matrices(&m, &inverse), 1e-5);
    }

    #[test]
    fn test_invert_translation() {
        let mut m = IDENTITY_MATRIX;
        m[3] = [5.0, -3.0, 2.0, 1.0];
        let inverse = invert_matrix(&m).unwrap();
        for (actual, expected) in inverse[3].iter().zip([-5.0, 3.0, -2.0, 1.0]) {
            assert!((actual - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_invert_singular() {
        let m: Matrix4 = [
            [1.0, 2.0, 3.0, 4.0],
            [2.0, 4.0, 6.0, 8.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        assert!(invert_matrix(&m).is_none());
    }
}
