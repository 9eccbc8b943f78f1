// Registry schema: files, peers and the ternary ownership relation.
diesel::table! {
    files (id) {
        id -> Integer,
        file_name -> Text,
        file_hash -> Text,         // SHA1 of the file content, unique
        piece_length -> Integer,
        total_pieces -> Integer,
    }
}

diesel::table! {
    peers (id) {
        id -> Integer,
        ip -> Text,
        port -> Integer,
        last_active -> Timestamp,  // refreshed on every announce
    }
}

diesel::table! {
    file_pieces (file_id, peer_id, piece_index) {
        file_id -> Integer,
        peer_id -> Integer,
        piece_index -> Integer,
    }
}

diesel::table! {
    piece_hashes (file_id, piece_index) {
        file_id -> Integer,
        piece_index -> Integer,
        piece_hash -> Text,        // SHA1 of the piece bytes
    }
}

diesel::joinable!(file_pieces -> files (file_id));
diesel::joinable!(file_pieces -> peers (peer_id));
diesel::joinable!(piece_hashes -> files (file_id));

diesel::allow_tables_to_appear_in_same_query!(files, peers, file_pieces, piece_hashes);
