use crate::error::{ErrorCode, MetapathError};

use super::Sequence;

/// An immutable array whose members are sequences. Positions are 1-based.
#[derive(Debug, Clone)]
pub struct ArrayItem<N> {
    members: Vec<Sequence<N>>,
}

impl<N> Default for ArrayItem<N> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
        }
    }
}

impl<N: Clone> ArrayItem<N> {
    pub fn new(members: Vec<Sequence<N>>) -> Self {
        Self { members }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[Sequence<N>] {
        &self.members
    }

    fn index(&self, position: i64) -> Result<usize, MetapathError> {
        if position < 1 || position as u64 > self.members.len() as u64 {
            return Err(out_of_bounds(position, self.members.len()));
        }
        Ok(position as usize - 1)
    }

    pub fn get(&self, position: i64) -> Result<&Sequence<N>, MetapathError> {
        let index = self.index(position)?;
        Ok(&self.members[index])
    }

    pub fn put(&self, position: i64, member: Sequence<N>) -> Result<Self, MetapathError> {
        let index = self.index(position)?;
        let mut members = self.members.clone();
        members[index] = member;
        Ok(Self { members })
    }

    pub fn append(&self, member: Sequence<N>) -> Self {
        let mut members = self.members.clone();
        members.push(member);
        Self { members }
    }

    /// Members from `start` (1-based), `length` of them or all remaining.
    pub fn subarray(&self, start: i64, length: Option<i64>) -> Result<Self, MetapathError> {
        let size = self.members.len() as i64;
        if start < 1 || start > size + 1 {
            return Err(out_of_bounds(start, self.members.len()));
        }
        let length = match length {
            Some(length) if length < 0 => {
                return Err(MetapathError::dynamic(
                    ErrorCode::FOAY0002,
                    format!("negative array length {length}"),
                ));
            }
            Some(length) if length > size + 1 - start => {
                return Err(out_of_bounds(
                    start.saturating_add(length - 1),
                    self.members.len(),
                ));
            }
            Some(length) => length,
            None => size + 1 - start,
        };
        let from = (start - 1) as usize;
        let to = from + length as usize;
        Ok(Self {
            members: self.members[from..to].to_vec(),
        })
    }

    pub fn remove(&self, positions: &[i64]) -> Result<Self, MetapathError> {
        let mut drop = vec![false; self.members.len()];
        for position in positions {
            drop[self.index(*position)?] = true;
        }
        let members = self
            .members
            .iter()
            .zip(drop)
            .filter(|(_, dropped)| !dropped)
            .map(|(member, _)| member.clone())
            .collect();
        Ok(Self { members })
    }

    pub fn insert_before(&self, position: i64, member: Sequence<N>) -> Result<Self, MetapathError> {
        if position < 1 || position as u64 > self.members.len() as u64 + 1 {
            return Err(out_of_bounds(position, self.members.len()));
        }
        let mut members = self.members.clone();
        members.insert(position as usize - 1, member);
        Ok(Self { members })
    }

    pub fn head(&self) -> Result<&Sequence<N>, MetapathError> {
        self.get(1)
    }

    pub fn tail(&self) -> Result<Self, MetapathError> {
        if self.members.is_empty() {
            return Err(out_of_bounds(1, 0));
        }
        Ok(Self {
            members: self.members[1..].to_vec(),
        })
    }

    pub fn reverse(&self) -> Self {
        Self {
            members: self.members.iter().rev().cloned().collect(),
        }
    }

    pub fn join<'s, I: IntoIterator<Item = &'s ArrayItem<N>>>(arrays: I) -> Self
    where
        N: 's,
    {
        Self {
            members: arrays
                .into_iter()
                .flat_map(|a| a.members.iter().cloned())
                .collect(),
        }
    }
}

fn out_of_bounds(position: i64, size: usize) -> MetapathError {
    MetapathError::dynamic(
        ErrorCode::FOAY0001,
        format!("array index {position} is out of bounds for an array of size {size}"),
    )
}
