//! Validated, immutable configuration of the redundancy layer.
//!
//! Configuration values are checked once, in their constructors; a value
//! that exists is a value that passed validation. Both peers of a RaSTA
//! link must be configured with the same check-code type.

use crate::error::RedError;
use crate::limits::{
    MAX_DEFER_QUEUE_SIZE, MAX_N_DIAGNOSIS, MAX_RED_CHANNELS, MAX_T_SEQ_MS, MAX_TRANSPORT_CHANNELS,
    MIN_DEFER_QUEUE_SIZE, MIN_N_DIAGNOSIS, MIN_T_SEQ_MS, TRANSPORT_CHANNEL_ID_SPACE,
};

/// Identifier of a redundancy channel. Equal to the channel's index in the
/// layer configuration.
pub type RedChannelId = u32;

/// Identifier of a transport channel, unique across the whole endpoint.
pub type TransportChannelId = u32;

/// The check code protecting each PDU, fixed at configuration time.
///
/// Types B and C are 32-bit CRCs, D and E are 16-bit CRCs, and type A
/// carries no check code at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckCodeType {
    /// No check code.
    A,
    /// CRC-32, polynomial 0xEE5B42FD, unreflected.
    B,
    /// CRC-32, polynomial 0x1EDC6F41, reflected.
    C,
    /// CRC-16, polynomial 0x1021, reflected.
    D,
    /// CRC-16, polynomial 0x8005, reflected.
    E,
}

impl CheckCodeType {
    /// Byte length of the check code appended to each PDU.
    pub fn code_len(self) -> usize {
        match self {
            CheckCodeType::A => 0,
            CheckCodeType::B | CheckCodeType::C => 4,
            CheckCodeType::D | CheckCodeType::E => 2,
        }
    }
}

/// Configuration of one redundancy channel: its id and the transport
/// channels bonded into it.
#[derive(Debug, Clone)]
pub struct RedundancyChannelConfig {
    red_channel_id: RedChannelId,
    transport_channel_ids: Vec<TransportChannelId>,
}

impl RedundancyChannelConfig {
    /// Create a channel configuration.
    ///
    /// The channel must carry between one and [`MAX_TRANSPORT_CHANNELS`]
    /// transport channels, each with an id inside the endpoint-wide id
    /// space and unique within the channel.
    pub fn new(
        red_channel_id: RedChannelId,
        transport_channel_ids: Vec<TransportChannelId>,
    ) -> Result<Self, RedError> {
        if transport_channel_ids.is_empty()
            || transport_channel_ids.len() > MAX_TRANSPORT_CHANNELS
        {
            return Err(RedError::InvalidConfiguration);
        }
        for (index, &id) in transport_channel_ids.iter().enumerate() {
            if id as usize >= TRANSPORT_CHANNEL_ID_SPACE {
                return Err(RedError::InvalidConfiguration);
            }
            if transport_channel_ids[..index].contains(&id) {
                return Err(RedError::InvalidConfiguration);
            }
        }
        Ok(Self {
            red_channel_id,
            transport_channel_ids,
        })
    }

    pub fn red_channel_id(&self) -> RedChannelId {
        self.red_channel_id
    }

    pub fn transport_channel_ids(&self) -> &[TransportChannelId] {
        &self.transport_channel_ids
    }

    pub fn num_transport_channels(&self) -> usize {
        self.transport_channel_ids.len()
    }

    /// Position of a transport channel inside this channel's bonding, or
    /// `None` if the id does not belong to this channel.
    pub fn transport_index(&self, id: TransportChannelId) -> Option<usize> {
        self.transport_channel_ids.iter().position(|&t| t == id)
    }
}

/// Root configuration of the redundancy layer.
#[derive(Debug, Clone)]
pub struct RedundancyLayerConfig {
    check_code_type: CheckCodeType,
    t_seq: u32,
    n_diagnosis: u32,
    n_defer_queue_size: u32,
    channels: Vec<RedundancyChannelConfig>,
}

impl RedundancyLayerConfig {
    /// Create and validate a layer configuration.
    ///
    /// Beyond the per-value ranges, every channel's id must equal its index
    /// in `channels`, and transport channel ids must be unique across the
    /// whole layer, not just within one channel.
    pub fn new(
        check_code_type: CheckCodeType,
        t_seq: u32,
        n_diagnosis: u32,
        n_defer_queue_size: u32,
        channels: Vec<RedundancyChannelConfig>,
    ) -> Result<Self, RedError> {
        if !(MIN_T_SEQ_MS..=MAX_T_SEQ_MS).contains(&t_seq)
            || !(MIN_N_DIAGNOSIS..=MAX_N_DIAGNOSIS).contains(&n_diagnosis)
            || !(MIN_DEFER_QUEUE_SIZE..=MAX_DEFER_QUEUE_SIZE).contains(&n_defer_queue_size)
        {
            return Err(RedError::InvalidConfiguration);
        }
        if channels.is_empty() || channels.len() > MAX_RED_CHANNELS {
            return Err(RedError::InvalidConfiguration);
        }
        let mut seen_transport_ids: Vec<TransportChannelId> = Vec::new();
        for (index, channel) in channels.iter().enumerate() {
            if channel.red_channel_id() as usize != index {
                return Err(RedError::InvalidConfiguration);
            }
            for &id in channel.transport_channel_ids() {
                if seen_transport_ids.contains(&id) {
                    return Err(RedError::InvalidConfiguration);
                }
                seen_transport_ids.push(id);
            }
        }
        Ok(Self {
            check_code_type,
            t_seq,
            n_diagnosis,
            n_defer_queue_size,
            channels,
        })
    }

    pub fn check_code_type(&self) -> CheckCodeType {
        self.check_code_type
    }

    /// Defer timeout Tseq in milliseconds.
    pub fn t_seq(&self) -> u32 {
        self.t_seq
    }

    /// Diagnosis window size in messages.
    pub fn n_diagnosis(&self) -> u32 {
        self.n_diagnosis
    }

    /// Defer queue capacity in messages.
    pub fn n_defer_queue_size(&self) -> u32 {
        self.n_defer_queue_size
    }

    pub fn channels(&self) -> &[RedundancyChannelConfig] {
        &self.channels
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The redundancy channel a transport channel is bonded into.
    pub fn associated_red_channel(&self, id: TransportChannelId) -> Option<RedChannelId> {
        self.channels
            .iter()
            .find(|c| c.transport_index(id).is_some())
            .map(|c| c.red_channel_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_channel_config() -> RedundancyLayerConfig {
        RedundancyLayerConfig::new(
            CheckCodeType::B,
            50,
            200,
            4,
            vec![
                RedundancyChannelConfig::new(0, vec![0, 1]).unwrap(),
                RedundancyChannelConfig::new(1, vec![2, 3]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn accepts_reference_configuration() {
        let config = two_channel_config();
        assert_eq!(config.num_channels(), 2);
        assert_eq!(config.channels()[1].transport_channel_ids(), &[2, 3]);
    }

    #[test]
    fn channel_id_must_equal_index() {
        let result = RedundancyLayerConfig::new(
            CheckCodeType::B,
            50,
            200,
            4,
            vec![RedundancyChannelConfig::new(1, vec![0]).unwrap()],
        );
        assert_eq!(result.unwrap_err(), RedError::InvalidConfiguration);
    }

    #[test]
    fn transport_ids_unique_across_channels() {
        let result = RedundancyLayerConfig::new(
            CheckCodeType::B,
            50,
            200,
            4,
            vec![
                RedundancyChannelConfig::new(0, vec![0, 1]).unwrap(),
                RedundancyChannelConfig::new(1, vec![1, 2]).unwrap(),
            ],
        );
        assert_eq!(result.unwrap_err(), RedError::InvalidConfiguration);
    }

    #[test]
    fn transport_ids_unique_within_channel() {
        assert_eq!(
            RedundancyChannelConfig::new(0, vec![1, 1]).unwrap_err(),
            RedError::InvalidConfiguration
        );
    }

    #[test]
    fn transport_id_must_fit_id_space() {
        assert!(RedundancyChannelConfig::new(0, vec![TRANSPORT_CHANNEL_ID_SPACE as u32]).is_err());
    }

    #[test]
    fn value_ranges_are_enforced() {
        let channels = || vec![RedundancyChannelConfig::new(0, vec![0]).unwrap()];
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 49, 200, 4, channels()).is_err());
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 501, 200, 4, channels()).is_err());
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 50, 9, 4, channels()).is_err());
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 50, 1001, 4, channels()).is_err());
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 50, 200, 3, channels()).is_err());
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 50, 200, 11, channels()).is_err());
        assert!(RedundancyLayerConfig::new(CheckCodeType::B, 50, 200, 4, vec![]).is_err());
    }

    #[test]
    fn associated_red_channel_lookup() {
        let config = two_channel_config();
        assert_eq!(config.associated_red_channel(0), Some(0));
        assert_eq!(config.associated_red_channel(3), Some(1));
        assert_eq!(config.associated_red_channel(4), None);
    }

    #[test]
    fn check_code_lengths() {
        assert_eq!(CheckCodeType::A.code_len(), 0);
        assert_eq!(CheckCodeType::B.code_len(), 4);
        assert_eq!(CheckCodeType::C.code_len(), 4);
        assert_eq!(CheckCodeType::D.code_len(), 2);
        assert_eq!(CheckCodeType::E.code_len(), 2);
    }
}
