//! Kafka gateway: consumes upload events, produces processing results.

use crate::config::KafkaConfig;
use crate::ports::gateway::{EventGateway, GatewayError};
use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Position of a received, not yet acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    topic: String,
    partition: i32,
    offset: i64,
}

impl Pending {
    /// Offsets are committed as the next position to read.
    fn to_partition_list(&self) -> Result<TopicPartitionList, GatewayError> {
        let mut list = TopicPartitionList::new();
        list.add_partition_offset(&self.topic, self.partition, Offset::Offset(self.offset + 1))
            .map_err(|e| GatewayError::Ack(e.to_string()))?;
        Ok(list)
    }
}

pub struct KafkaGateway {
    consumer: StreamConsumer,
    producer: FutureProducer,
    output_topic: String,
    pending: Mutex<Option<Pending>>,
}

impl KafkaGateway {
    pub fn new(config: &KafkaConfig) -> Result<Self, GatewayError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            // offsets are stored on ack, after the event is handled
            .set("enable.auto.offset.store", "false")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            // a single ladder encode can run far longer than the default
            .set("max.poll.interval.ms", "3600000")
            .create()
            .map_err(|e| GatewayError::Receive(format!("failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[config.input_topic.as_str()])
            .map_err(|e| GatewayError::Receive(format!("failed to subscribe: {e}")))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| GatewayError::Publish(format!("failed to create producer: {e}")))?;

        info!(
            brokers = %config.brokers,
            input_topic = %config.input_topic,
            output_topic = %config.output_topic,
            group_id = %config.group_id,
            "Kafka gateway initialized"
        );

        Ok(Self {
            consumer,
            producer,
            output_topic: config.output_topic.clone(),
            pending: Mutex::new(None),
        })
    }
}

#[async_trait]
impl EventGateway for KafkaGateway {
    async fn receive(&self) -> Result<Option<Bytes>, GatewayError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| GatewayError::Receive(e.to_string()))?;

        let position = Pending {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        };

        match message.payload() {
            Some(payload) => {
                let payload = Bytes::copy_from_slice(payload);
                if let Ok(mut pending) = self.pending.lock() {
                    *pending = Some(position);
                }
                Ok(Some(payload))
            }
            None => {
                debug!(
                    partition = position.partition,
                    offset = position.offset,
                    "Empty message payload, skipping"
                );
                self.store(&position)?;
                Ok(None)
            }
        }
    }

    async fn publish(&self, payload: Bytes) -> Result<(), GatewayError> {
        let record = FutureRecord::<(), [u8]>::to(&self.output_topic).payload(&payload[..]);

        let (partition, offset) = self
            .producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(e, _)| GatewayError::Publish(e.to_string()))?;

        debug!(topic = %self.output_topic, partition, offset, "Result delivered");
        Ok(())
    }

    async fn ack(&self) -> Result<(), GatewayError> {
        let position = self
            .pending
            .lock()
            .map_err(|_| GatewayError::Ack("pending offset lock poisoned".to_string()))?
            .take();

        match position {
            Some(position) => self.store(&position),
            None => Ok(()),
        }
    }
}

impl KafkaGateway {
    fn store(&self, position: &Pending) -> Result<(), GatewayError> {
        let list = position.to_partition_list()?;
        self.consumer
            .store_offsets(&list)
            .map_err(|e| GatewayError::Ack(e.to_string()))?;
        debug!(
            topic = %position.topic,
            partition = position.partition,
            offset = position.offset,
            "Offset stored"
        );
        Ok(())
    }
}
