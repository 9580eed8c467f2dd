//! 패킷 정의 및 와이어 포맷
//!
//! 모든 필드는 빅엔디안 고정 폭 헤더로 기록됨
//!
//! ```text
//! +--------+------+-------+--------+-----------------+
//! | magic  | type | seqno | length | payload ...     |
//! | 2B     | 1B   | 1B    | 2B     | length bytes    |
//! +--------+------+-------+--------+-----------------+
//! ```
//!
//! 디코딩 실패와 매직 넘버 불일치는 호출자 입장에서 구분되지 않는다.
//! 둘 다 "버리고 아무것도 하지 않음"으로 처리된다.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result, HEADER_LEN, MAGIC_NUMBER, MAX_PAYLOAD};

// 헤더 필드 오프셋
const OFF_MAGIC: usize = 0;
const OFF_TYPE: usize = 2;
const OFF_SEQNO: usize = 3;
const OFF_LENGTH: usize = 4;

/// 패킷 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// 데이터 (0 ~ 512 bytes)
    Data = 0,

    /// 확인 응답 (페이로드 없음)
    Ack = 1,
}

impl PacketType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Ack),
            _ => None,
        }
    }
}

/// 1비트 시퀀스 번호
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SeqNo {
    #[default]
    Zero = 0,
    One = 1,
}

impl SeqNo {
    /// 반대 값
    pub fn flip(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// 디코딩 실패 사유 (로깅용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// 헤더보다 짧음
    TooShort { len: usize },

    /// 매직 넘버 불일치
    BadMagic { got: u16 },

    /// 알 수 없는 타입 바이트
    BadType { got: u8 },

    /// 시퀀스 번호가 0/1이 아님
    BadSeqNo { got: u8 },

    /// 선언 길이가 최대 페이로드 초과
    Oversized { declared: usize },

    /// 선언 길이와 남은 바이트 수 불일치
    LengthMismatch { declared: usize, actual: usize },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "헤더보다 짧은 버퍼: {} bytes", len),
            Self::BadMagic { got } => {
                write!(f, "매직 넘버 불일치: expected {:04X}, got {:04X}", MAGIC_NUMBER, got)
            }
            Self::BadType { got } => write!(f, "알 수 없는 패킷 타입: {}", got),
            Self::BadSeqNo { got } => write!(f, "유효하지 않은 시퀀스 번호: {}", got),
            Self::Oversized { declared } => write!(f, "페이로드 길이 초과: {}", declared),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "길이 불일치: declared {}, actual {}", declared, actual)
            }
        }
    }
}

impl std::error::Error for PacketError {}

/// SARQ 패킷
///
/// 생성자가 `length <= MAX_PAYLOAD`를 보장하므로 모든 값은 인코딩 가능하다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    seqno: SeqNo,
    payload: Bytes,
}

impl Packet {
    /// 데이터 패킷 생성
    pub fn data(seqno: SeqNo, payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        Ok(Self {
            packet_type: PacketType::Data,
            seqno,
            payload,
        })
    }

    /// 전송 종료 표시용 빈 데이터 패킷
    pub fn sentinel(seqno: SeqNo) -> Self {
        Self {
            packet_type: PacketType::Data,
            seqno,
            payload: Bytes::new(),
        }
    }

    /// ACK 패킷 생성
    pub fn ack(seqno: SeqNo) -> Self {
        Self {
            packet_type: PacketType::Ack,
            seqno,
            payload: Bytes::new(),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn seqno(&self) -> SeqNo {
        self.seqno
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// 송신자가 수락하는 ACK인지 확인 (타입 ACK + 빈 페이로드)
    pub fn is_valid_ack(&self) -> bool {
        self.packet_type == PacketType::Ack && self.payload.is_empty()
    }

    /// 바이트로 직렬화
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u16(MAGIC_NUMBER);
        buf.put_u8(self.packet_type as u8);
        buf.put_u8(self.seqno as u8);
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// 바이트에서 역직렬화
    ///
    /// 어떤 입력에도 패닉하지 않는다.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN {
            return Err(PacketError::TooShort { len: bytes.len() });
        }

        let magic = u16::from_be_bytes([bytes[OFF_MAGIC], bytes[OFF_MAGIC + 1]]);
        if magic != MAGIC_NUMBER {
            return Err(PacketError::BadMagic { got: magic });
        }

        let packet_type = PacketType::from_u8(bytes[OFF_TYPE])
            .ok_or(PacketError::BadType { got: bytes[OFF_TYPE] })?;
        let seqno = SeqNo::from_u8(bytes[OFF_SEQNO])
            .ok_or(PacketError::BadSeqNo { got: bytes[OFF_SEQNO] })?;

        let declared = u16::from_be_bytes([bytes[OFF_LENGTH], bytes[OFF_LENGTH + 1]]) as usize;
        if declared > MAX_PAYLOAD {
            return Err(PacketError::Oversized { declared });
        }

        let actual = bytes.len() - HEADER_LEN;
        if declared != actual {
            return Err(PacketError::LengthMismatch { declared, actual });
        }

        Ok(Self {
            packet_type,
            seqno,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..]),
        })
    }

    /// 유효한 패킷이면 Some
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::decode(bytes).ok()
    }
}
