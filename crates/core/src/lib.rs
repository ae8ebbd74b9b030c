//! Face sequence preparation and ground-truth annotation resolution.
//!
//! A catalog of videos is turned, sequence by sequence, into extracted
//! frames, face detections, identity clusters and finally a validated
//! assignment of every annotation stream to one identity cluster. Each
//! stage caches its output on disk and is skipped when that cache is
//! current.

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod sequence_meta;
    pub mod settings;
}

pub mod layout {
    pub mod artifact_kind;
    pub mod sequence_layout;
}

pub mod cache {
    pub mod fingerprint;
    pub mod record;
    pub mod records;
}

pub mod catalog {
    pub mod domain {
        pub mod video_catalog;
        pub mod video_prober;
    }
    pub mod infrastructure {
        pub mod ffmpeg_prober;
    }
    pub mod sequence_store;
}

pub mod video {
    pub mod domain {
        pub mod frame_extractor;
        pub mod image_store;
    }
    pub mod infrastructure {
        pub mod ffmpeg_frame_extractor;
        pub mod image_file_store;
    }
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod emotion_extractor;
        pub mod face_detector;
        pub mod face_embedder;
        pub mod face_landmarks;
    }
    pub mod infrastructure;
}

pub mod recognition {
    pub mod domain {
        pub mod cluster_label;
        pub mod identity_cluster;
        pub mod identity_clusterer;
    }
    pub mod infrastructure {
        pub mod dbscan_clusterer;
    }
}

pub mod annotation {
    pub mod domain {
        pub mod annotation_category;
        pub mod annotation_resolver;
        pub mod annotation_stream;
        pub mod assignment_case;
        pub mod population_ranking;
        pub mod stream_matcher;
    }
    pub mod infrastructure {
        pub mod csv_annotation_reader;
    }
}

pub mod pipeline {
    pub mod detect_faces_use_case;
    pub mod extract_emotions_use_case;
    pub mod extract_frames_use_case;
    pub mod pipeline_context;
    pub mod pipeline_error;
    pub mod pipeline_logger;
    pub mod recognize_faces_use_case;
    pub mod resolve_annotations_use_case;
    pub mod sequence_pipeline;
    pub mod stage;
}
