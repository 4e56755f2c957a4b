use anyhow::bail;
use prost::Message as _;

pub const GROUND_STEERING_REQUEST_ID: i32 = 1090;
pub const DISTANCE_READING_ID: i32 = 1039;

/// Wrapper carried on the wire. `serialized_data` holds one of the payload
/// messages below, identified by `data_type`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(int32, tag = "1")]
    pub data_type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub serialized_data: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub sent: Option<TimeStamp>,
    #[prost(message, optional, tag = "4")]
    pub received: Option<TimeStamp>,
    #[prost(message, optional, tag = "5")]
    pub sample_time_stamp: Option<TimeStamp>,
    #[prost(uint32, tag = "6")]
    pub sender_stamp: u32,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct TimeStamp {
    #[prost(int32, tag = "1")]
    pub seconds: i32,
    #[prost(int32, tag = "2")]
    pub microseconds: i32,
}

impl TimeStamp {
    pub fn from_micros(micros: i64) -> Self {
        Self {
            seconds: (micros.div_euclid(1_000_000)) as i32,
            microseconds: (micros.rem_euclid(1_000_000)) as i32,
        }
    }

    pub fn as_micros(&self) -> i64 {
        self.seconds as i64 * 1_000_000 + self.microseconds as i64
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroundSteeringRequest {
    #[prost(float, tag = "1")]
    pub ground_steering: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DistanceReading {
    #[prost(float, tag = "1")]
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    GroundSteering(f32),
    Distance(f32),
}

impl Envelope {
    pub fn ground_steering(value: f32, sender_stamp: u32) -> Self {
        Self {
            data_type: GROUND_STEERING_REQUEST_ID,
            serialized_data: GroundSteeringRequest { ground_steering: value }.encode_to_vec(),
            sender_stamp,
            ..Default::default()
        }
    }

    pub fn distance(value: f32, sender_stamp: u32) -> Self {
        Self {
            data_type: DISTANCE_READING_ID,
            serialized_data: DistanceReading { distance: value }.encode_to_vec(),
            sender_stamp,
            ..Default::default()
        }
    }

    /// When the payload was sampled, falling back to when it was sent.
    pub fn timestamp_micros(&self) -> Option<i64> {
        self.sample_time_stamp.or(self.sent).map(|t| t.as_micros())
    }

    pub fn with_sample_time(mut self, micros: i64) -> Self {
        self.sample_time_stamp = Some(TimeStamp::from_micros(micros));
        self
    }

    /// Decodes the payload. Envelopes of other data types are not an error,
    /// they are just not ours.
    pub fn reading(&self) -> anyhow::Result<Option<Reading>> {
        let data = self.serialized_data.as_slice();
        let reading = match self.data_type {
            GROUND_STEERING_REQUEST_ID => {
                Reading::GroundSteering(GroundSteeringRequest::decode(data)?.ground_steering)
            }
            DISTANCE_READING_ID => Reading::Distance(DistanceReading::decode(data)?.distance),
            other if other <= 0 => bail!("Invalid data type {other} in envelope"),
            other => {
                log::debug!("Ignoring envelope with data type {other}");
                return Ok(None);
            }
        };

        Ok(Some(reading))
    }
}
