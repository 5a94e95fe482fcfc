use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 端点的访问模式，也用作后端声明的支持动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    ReadWrite,
}

impl Action {
    /// 合并两条边带来的模式，取限制更少的一方
    pub fn combine(self, other: Action) -> Action {
        if self == other {
            self
        } else {
            Action::ReadWrite
        }
    }

    pub fn can_read(self) -> bool {
        matches!(self, Action::Read | Action::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Action::Write | Action::ReadWrite)
    }

    /// 后端声明的动作是否满足端点所需的模式
    pub fn permits(self, required: Action) -> bool {
        self == Action::ReadWrite || self == required
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => write!(f, "r"),
            Action::Write => write!(f, "w"),
            Action::ReadWrite => write!(f, "rw"),
        }
    }
}

/// 两个端点之间的同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `<`：右边同步到左边
    RightToLeft,
    /// `=`：双向
    Both,
    /// `>`：左边同步到右边
    LeftToRight,
}

impl Direction {
    pub const ALL: [Direction; 3] = [
        Direction::RightToLeft,
        Direction::Both,
        Direction::LeftToRight,
    ];

    pub fn from_symbol(c: char) -> Option<Direction> {
        match c {
            '<' => Some(Direction::RightToLeft),
            '=' => Some(Direction::Both),
            '>' => Some(Direction::LeftToRight),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Direction::RightToLeft => '<',
            Direction::Both => '=',
            Direction::LeftToRight => '>',
        }
    }

    /// (左端点模式, 右端点模式)
    pub fn actions(self) -> (Action, Action) {
        match self {
            Direction::RightToLeft => (Action::Write, Action::Read),
            Direction::Both => (Action::ReadWrite, Action::ReadWrite),
            Direction::LeftToRight => (Action::Read, Action::Write),
        }
    }

    pub fn writes_left(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::Both)
    }

    pub fn writes_right(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::Both)
    }

    /// 两端声明的动作允许的方向
    pub fn enabled(left: Action, right: Action) -> Vec<Direction> {
        Self::ALL
            .into_iter()
            .filter(|d| {
                let (l, r) = d.actions();
                left.permits(l) && right.permits(r)
            })
            .collect()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 方向图中的一条边，两端是端点表中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionEdge {
    pub left: usize,
    pub right: usize,
    pub direction: Direction,
}

impl DirectionEdge {
    pub fn new(left: usize, right: usize, direction: Direction) -> Result<Self> {
        if left == right {
            return Err(SyncError::MalformedInput(
                "a direction must connect two distinct endpoints".to_string(),
            ));
        }
        Ok(Self {
            left,
            right,
            direction,
        })
    }
}

/// 根据所有边推导每个端点的有效访问模式
///
/// 没有被任何边触及的端点返回 None。
pub fn derive_access(endpoint_count: usize, edges: &[DirectionEdge]) -> Vec<Option<Action>> {
    let mut modes: Vec<Option<Action>> = vec![None; endpoint_count];

    for edge in edges {
        let (left, right) = edge.direction.actions();
        for (index, action) in [(edge.left, left), (edge.right, right)] {
            let slot = &mut modes[index];
            *slot = Some(slot.map_or(action, |current| current.combine(action)));
        }
    }

    modes
}
