//! 场景编解码族标识.
//!
//! 场景流的 objectTypeIndication 决定使用哪一族编码器:
//! BIFS (OTI 1/2) 或 LASeR (OTI 0x09). 同一次编码调用中两族互斥.

use std::fmt;

use serde::{Deserialize, Serialize};

/// LASeR 场景流的 objectTypeIndication
pub const LASER_OBJECT_TYPE: u8 = 0x09;

/// 场景编解码族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneFamily {
    /// BIFS 风格 (ISO/IEC 14496-11)
    Bifs,
    /// LASeR 风格 (ISO/IEC 14496-20)
    Laser,
}

impl SceneFamily {
    /// 全部编码族, 按编码顺序排列
    pub const ALL: [Self; 2] = [Self::Bifs, Self::Laser];

    /// 根据场景流的 objectTypeIndication 判断所属族
    ///
    /// OTI 不超过 2 的流 (含未设置的 0) 归 BIFS, 0x09 归 LASeR, 其余不参与场景编码.
    pub fn from_object_type(oti: u8) -> Option<Self> {
        match oti {
            0..=2 => Some(Self::Bifs),
            LASER_OBJECT_TYPE => Some(Self::Laser),
            _ => None,
        }
    }

    /// 是否由本族处理该 OTI 的流
    pub fn accepts(self, oti: u8) -> bool {
        Self::from_object_type(oti) == Some(self)
    }

    /// 族名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Bifs => "bifs",
            Self::Laser => "laser",
        }
    }
}

impl fmt::Display for SceneFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
